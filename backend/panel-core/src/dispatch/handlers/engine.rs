//! Requests from engine clients: factory queries, instance lifetime, and
//! calls forwarded into an instance.

use crate::dispatch::handlers::{ENGINE, drive, drive_with, instance_arg};
use crate::dispatch::{Dispatcher, HandlerOutcome, HandlerTable, Request};
use crate::engine::EngineFactory;
use crate::transaction::{Opcode, Transaction};

use models::KeyEvent;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{debug, info, warn};

pub(crate) fn register(table: &mut HandlerTable) {
    table
        .sync(Opcode::GetFactoryList, ENGINE, get_factory_list)
        .sync(Opcode::GetFactoryName, ENGINE, get_factory_name)
        .sync(Opcode::GetFactoryLocales, ENGINE, get_factory_locales)
        .sync(Opcode::GetFactoryLanguage, ENGINE, get_factory_language)
        .sync(Opcode::GetFactoryIconFile, ENGINE, get_factory_icon_file)
        .sync(Opcode::GetFactoryHelp, ENGINE, get_factory_help)
        .sync(Opcode::NewInstance, ENGINE, new_instance)
        .sync(Opcode::DeleteInstance, ENGINE, delete_instance)
        .sync(Opcode::DeleteAllInstances, ENGINE, delete_all_instances)
        .asynchronous(Opcode::ProcessKeyEvent, ENGINE, process_key_event)
        .asynchronous(Opcode::MoveCaret, ENGINE, move_caret)
        .asynchronous(Opcode::SelectCandidate, ENGINE, select_candidate)
        .asynchronous(Opcode::UpdateLookupTablePageSize, ENGINE, update_lookup_table_page_size)
        .asynchronous(Opcode::LookupTablePageUp, ENGINE, lookup_table_page_up)
        .asynchronous(Opcode::LookupTablePageDown, ENGINE, lookup_table_page_down)
        .asynchronous(Opcode::Reset, ENGINE, reset)
        .asynchronous(Opcode::FocusIn, ENGINE, focus_in)
        .asynchronous(Opcode::FocusOut, ENGINE, focus_out)
        .asynchronous(Opcode::TriggerProperty, ENGINE, trigger_property)
        .asynchronous(Opcode::ProcessHelperEvent, ENGINE, process_helper_event)
        .asynchronous(Opcode::UpdateClientCapabilities, ENGINE, update_client_capabilities)
        .asynchronous(Opcode::SetLayout, ENGINE, set_layout)
        .asynchronous(Opcode::SetImData, ENGINE, set_im_data)
        .sync(Opcode::GetInputPanelGeometry, ENGINE, get_input_panel_geometry);
}

// ============================================
// FACTORIES
// ============================================

fn get_factory_list(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Ok(encoding) = request.inbound.get::<String>() else {
        return HandlerOutcome::Malformed;
    };
    let uuids = dispatcher.engines.factory_uuids(&encoding);
    request.ok().put(&uuids);
    HandlerOutcome::Done
}

/// Shared body of the single-string factory queries.
fn factory_field(
    dispatcher: &Dispatcher,
    request: &mut Request,
    field: fn(&dyn EngineFactory) -> String,
) -> HandlerOutcome {
    let Ok(uuid) = request.inbound.get::<String>() else {
        return HandlerOutcome::Malformed;
    };
    match dispatcher.engines.factory(&uuid) {
        Some(factory) => {
            let value = field(factory);
            request.ok().put(&value);
        }
        None => {
            debug!("{}: no factory {}", request.connection, uuid);
            request.fail();
        }
    }
    HandlerOutcome::Done
}

fn get_factory_name(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    factory_field(dispatcher, request, |factory| factory.name().to_string())
}

fn get_factory_locales(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    factory_field(dispatcher, request, |factory| factory.locales().join(","))
}

fn get_factory_language(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    factory_field(dispatcher, request, |factory| factory.language().to_string())
}

fn get_factory_icon_file(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    factory_field(dispatcher, request, |factory| factory.icon_file().to_string())
}

fn get_factory_help(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    factory_field(dispatcher, request, |factory| factory.help())
}

// ============================================
// INSTANCE LIFETIME
// ============================================

fn new_instance(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let (Ok(uuid), Ok(encoding)) = (
        request.inbound.get::<String>(),
        request.inbound.get::<String>(),
    ) else {
        return HandlerOutcome::Malformed;
    };

    match dispatcher.engines.new_instance(&uuid, &encoding) {
        Ok(instance) => {
            dispatcher.instances.insert(request.connection, instance);
            info!("{} created {} of {}", request.connection, instance, uuid);
            request.ok().put(&instance.get());
        }
        Err(e) => {
            warn!("{}: cannot create instance of {}: {}", request.connection, uuid, e);
            request.fail();
        }
    }
    HandlerOutcome::Done
}

fn delete_instance(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Some(instance) = instance_arg(request) else {
        return HandlerOutcome::Malformed;
    };

    if dispatcher.instances.remove(request.connection, instance) {
        dispatcher.engines.delete_instance(instance);
        debug!("{} deleted {}", request.connection, instance);
        request.ok();
    } else {
        warn!("{} tried to delete {} it does not own", request.connection, instance);
        request.fail();
    }
    HandlerOutcome::Done
}

fn delete_all_instances(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let removed = dispatcher.instances.remove_all(request.connection);
    for instance in &removed {
        dispatcher.engines.delete_instance(*instance);
    }
    debug!("{} deleted {} instances", request.connection, removed.len());
    request.ok();
    HandlerOutcome::Done
}

// ============================================
// INSTANCE CALLS
// ============================================

/// `[Ok][Uint32 consumed]`; a key the engine declines is still a success.
fn process_key_event<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let (Some(instance), Ok(key)) =
            (instance_arg(request), request.inbound.get::<KeyEvent>())
        else {
            return HandlerOutcome::Malformed;
        };
        let consumed = drive_with(dispatcher, request, instance, move |engine, ctx| {
            async move { engine.process_key_event(&key, ctx).await }.boxed()
        })
        .await;
        match consumed {
            Ok(consumed) => {
                request.ok().put(&u32::from(consumed));
                HandlerOutcome::Done
            }
            Err(outcome) => outcome,
        }
    }
    .boxed()
}

fn move_caret<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let (Some(instance), Ok(position)) = (instance_arg(request), request.inbound.get::<u32>())
        else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, move |engine, ctx| {
            async move {
                engine.move_caret(position, ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

fn select_candidate<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let (Some(instance), Ok(index)) = (instance_arg(request), request.inbound.get::<u32>())
        else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, move |engine, ctx| {
            async move {
                engine.select_candidate(index, ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

fn update_lookup_table_page_size<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let (Some(instance), Ok(size)) = (instance_arg(request), request.inbound.get::<u32>())
        else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, move |engine, ctx| {
            async move {
                engine.update_lookup_table_page_size(size, ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

fn lookup_table_page_up<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let Some(instance) = instance_arg(request) else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, |engine, ctx| {
            async move {
                engine.lookup_table_page_up(ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

fn lookup_table_page_down<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let Some(instance) = instance_arg(request) else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, |engine, ctx| {
            async move {
                engine.lookup_table_page_down(ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

fn reset<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let Some(instance) = instance_arg(request) else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, |engine, ctx| {
            async move {
                engine.reset(ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

fn focus_in<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let Some(instance) = instance_arg(request) else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, |engine, ctx| {
            async move {
                engine.focus_in(ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

fn focus_out<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let Some(instance) = instance_arg(request) else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, |engine, ctx| {
            async move {
                engine.focus_out(ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

fn trigger_property<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let (Some(instance), Ok(property)) =
            (instance_arg(request), request.inbound.get::<String>())
        else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, move |engine, ctx| {
            async move {
                engine.trigger_property(&property, ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

fn process_helper_event<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let (Some(instance), Ok(helper), Ok(event)) = (
            instance_arg(request),
            request.inbound.get::<String>(),
            request.inbound.get::<Transaction>(),
        ) else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, move |engine, ctx| {
            async move {
                engine.process_helper_event(&helper, &event, ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

fn update_client_capabilities<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let (Some(instance), Ok(capabilities)) =
            (instance_arg(request), request.inbound.get::<u32>())
        else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, move |engine, ctx| {
            async move {
                engine.update_client_capabilities(capabilities, ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

fn set_layout<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let (Some(instance), Ok(layout)) = (instance_arg(request), request.inbound.get::<u32>())
        else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, move |engine, ctx| {
            async move {
                engine.set_layout(layout, ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

fn set_im_data<'a>(
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
) -> BoxFuture<'a, HandlerOutcome> {
    async move {
        let (Some(instance), Ok(data)) = (instance_arg(request), request.inbound.get::<Vec<u8>>())
        else {
            return HandlerOutcome::Malformed;
        };
        drive(dispatcher, request, instance, move |engine, ctx| {
            async move {
                engine.set_im_data(&data, ctx).await;
                true
            }
            .boxed()
        })
        .await
    }
    .boxed()
}

// ============================================
// PANEL
// ============================================

fn get_input_panel_geometry(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let rect = dispatcher.observer.on_update_geometry_request();
    request
        .ok()
        .put(&(rect.x as u32))
        .put(&(rect.y as u32))
        .put(&rect.width)
        .put(&rect.height);
    HandlerOutcome::Done
}
