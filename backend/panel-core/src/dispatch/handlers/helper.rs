//! Requests from the helper manager: helper lifecycle and the installed
//! module set.

use crate::dispatch::handlers::{CATALOGUE_READERS, HELPER_MANAGER};
use crate::dispatch::{Dispatcher, HandlerOutcome, HandlerTable, Request};
use crate::supervisor::HelperState;
use crate::transaction::Opcode;
use crate::transaction::records::{put_helper_list, put_ise_list};

use std::path::PathBuf;

use log::{info, warn};

pub(crate) fn register(table: &mut HandlerTable) {
    table
        .sync(Opcode::GetHelperList, HELPER_MANAGER, get_helper_list)
        .sync(Opcode::GetActiveHelpers, HELPER_MANAGER, get_active_helpers)
        .sync(Opcode::GetIseList, CATALOGUE_READERS, get_ise_list)
        .sync(Opcode::RunHelper, HELPER_MANAGER, run_helper)
        .sync(Opcode::TerminateHelper, HELPER_MANAGER, terminate_helper)
        .sync(Opcode::RegisterHelper, HELPER_MANAGER, register_helper)
        .sync(Opcode::InstallModule, HELPER_MANAGER, install_module)
        .sync(Opcode::UninstallModule, HELPER_MANAGER, uninstall_module)
        .sync(Opcode::RescanModules, HELPER_MANAGER, rescan_modules);
}

fn get_helper_list(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let helpers = dispatcher.supervisor.helper_list();
    put_helper_list(request.ok(), &helpers);
    HandlerOutcome::Done
}

fn get_active_helpers(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let active = dispatcher.supervisor.active_helpers();
    request.ok().put(&active);
    HandlerOutcome::Done
}

fn get_ise_list(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    put_ise_list(request.ok(), dispatcher.supervisor.catalogue().iter());
    HandlerOutcome::Done
}

/// Launch a helper. On success the requester hears nothing back; the helper
/// itself reports in with `RegisterHelper` once it is up. A launch that
/// fails is answered with `Fail`.
fn run_helper(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Ok(uuid) = request.inbound.get::<String>() else {
        return HandlerOutcome::Malformed;
    };
    match dispatcher.supervisor.start_helper(&uuid) {
        Ok(()) => {
            info!("{} launched helper {}", request.connection, uuid);
            HandlerOutcome::NoReply
        }
        Err(e) => {
            warn!("{} could not launch helper {}: {}", request.connection, uuid, e);
            request.fail();
            HandlerOutcome::Done
        }
    }
}

fn terminate_helper(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Ok(uuid) = request.inbound.get::<String>() else {
        return HandlerOutcome::Malformed;
    };
    if dispatcher.request_helper_stop(&uuid) {
        request.ok();
    } else {
        request.fail();
    }
    HandlerOutcome::Done
}

fn register_helper(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Ok(uuid) = request.inbound.get::<String>() else {
        return HandlerOutcome::Malformed;
    };
    match dispatcher.supervisor.register_helper(&uuid, request.connection) {
        Ok(()) => {
            dispatcher
                .observer
                .on_ise_state_changed(&uuid, HelperState::Running);
            request.ok();
        }
        Err(e) => {
            warn!("{}: {}", request.connection, e);
            request.fail();
        }
    }
    HandlerOutcome::Done
}

/// `[Ok][Uint32 changed]` once the manifest's entries are in the catalogue.
fn install_module(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Ok(path) = request.inbound.get::<String>() else {
        return HandlerOutcome::Malformed;
    };
    match dispatcher.supervisor.install(&PathBuf::from(&path)) {
        Ok(changed) => {
            if changed {
                dispatcher.reload_factories();
            }
            request.ok().put(&u32::from(changed));
        }
        Err(e) => {
            warn!("{}: install of {} failed: {}", request.connection, path, e);
            request.fail();
        }
    }
    HandlerOutcome::Done
}

fn uninstall_module(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Ok(module) = request.inbound.get::<String>() else {
        return HandlerOutcome::Malformed;
    };
    match dispatcher.supervisor.uninstall(&module) {
        Ok(changed) => {
            if changed {
                dispatcher.reload_factories();
            }
            request.ok().put(&u32::from(changed));
        }
        Err(e) => {
            warn!("{}: uninstall of {} failed: {}", request.connection, module, e);
            request.fail();
        }
    }
    HandlerOutcome::Done
}

fn rescan_modules(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    dispatcher.rescan_modules();
    request.ok();
    HandlerOutcome::Done
}
