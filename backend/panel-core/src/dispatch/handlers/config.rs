//! Requests from config clients against the broker's key/value store.
//!
//! Ints and bools travel as `Uint32`, doubles as their decimal string.

use crate::config::ConfigValue;
use crate::dispatch::handlers::CONFIG;
use crate::dispatch::{Dispatcher, HandlerOutcome, HandlerTable, Request};
use crate::transaction::{Opcode, WireEncode};

use log::warn;

pub(crate) fn register(table: &mut HandlerTable) {
    table
        .sync(Opcode::GetConfigString, CONFIG, get_string)
        .sync(Opcode::SetConfigString, CONFIG, set_string)
        .sync(Opcode::GetConfigInt, CONFIG, get_int)
        .sync(Opcode::SetConfigInt, CONFIG, set_int)
        .sync(Opcode::GetConfigBool, CONFIG, get_bool)
        .sync(Opcode::SetConfigBool, CONFIG, set_bool)
        .sync(Opcode::GetConfigDouble, CONFIG, get_double)
        .sync(Opcode::SetConfigDouble, CONFIG, set_double)
        .sync(Opcode::GetConfigStringList, CONFIG, get_string_list)
        .sync(Opcode::SetConfigStringList, CONFIG, set_string_list)
        .sync(Opcode::GetConfigIntList, CONFIG, get_int_list)
        .sync(Opcode::SetConfigIntList, CONFIG, set_int_list)
        .sync(Opcode::EraseConfig, CONFIG, erase)
        .sync(Opcode::FlushConfig, CONFIG, flush)
        .sync(Opcode::ReloadConfig, CONFIG, reload);
}

fn key_arg(request: &mut Request) -> Option<String> {
    request.inbound.get::<String>().ok()
}

/// `[Ok][value]` when the key holds a value of the requested type,
/// `[Fail]` otherwise.
fn reply_with<T: WireEncode + ?Sized>(request: &mut Request, value: Option<&T>) -> HandlerOutcome {
    match value {
        Some(value) => {
            request.ok().put(value);
        }
        None => request.fail(),
    }
    HandlerOutcome::Done
}

fn get_string(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Some(key) = key_arg(request) else {
        return HandlerOutcome::Malformed;
    };
    reply_with(request, dispatcher.store.get_string(&key))
}

fn get_int(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Some(key) = key_arg(request) else {
        return HandlerOutcome::Malformed;
    };
    let value = dispatcher.store.get_int(&key).map(|value| value as u32);
    reply_with(request, value.as_ref())
}

fn get_bool(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Some(key) = key_arg(request) else {
        return HandlerOutcome::Malformed;
    };
    let value = dispatcher.store.get_bool(&key).map(u32::from);
    reply_with(request, value.as_ref())
}

fn get_double(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Some(key) = key_arg(request) else {
        return HandlerOutcome::Malformed;
    };
    let value = dispatcher.store.get_double(&key).map(|value| value.to_string());
    reply_with(request, value.as_ref())
}

fn get_string_list(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Some(key) = key_arg(request) else {
        return HandlerOutcome::Malformed;
    };
    let value = dispatcher.store.get_string_list(&key).map(<[String]>::to_vec);
    reply_with(request, value.as_ref())
}

fn get_int_list(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Some(key) = key_arg(request) else {
        return HandlerOutcome::Malformed;
    };
    let value: Option<Vec<u32>> = dispatcher
        .store
        .get_int_list(&key)
        .map(|values| values.iter().map(|value| *value as u32).collect());
    reply_with(request, value.as_ref())
}

fn set_string(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let (Ok(key), Ok(value)) = (request.inbound.get::<String>(), request.inbound.get::<String>())
    else {
        return HandlerOutcome::Malformed;
    };
    store_value(dispatcher, request, key, ConfigValue::String(value))
}

fn set_int(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let (Ok(key), Ok(value)) = (request.inbound.get::<String>(), request.inbound.get::<u32>())
    else {
        return HandlerOutcome::Malformed;
    };
    store_value(dispatcher, request, key, ConfigValue::Int(value as i32))
}

fn set_bool(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let (Ok(key), Ok(value)) = (request.inbound.get::<String>(), request.inbound.get::<u32>())
    else {
        return HandlerOutcome::Malformed;
    };
    store_value(dispatcher, request, key, ConfigValue::Bool(value != 0))
}

fn set_double(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let (Ok(key), Ok(text)) = (request.inbound.get::<String>(), request.inbound.get::<String>())
    else {
        return HandlerOutcome::Malformed;
    };
    match text.trim().parse::<f64>() {
        Ok(value) => store_value(dispatcher, request, key, ConfigValue::Double(value)),
        Err(e) => {
            warn!("{}: {:?} is not a double: {}", request.connection, text, e);
            request.fail();
            HandlerOutcome::Done
        }
    }
}

fn set_string_list(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let (Ok(key), Ok(value)) = (
        request.inbound.get::<String>(),
        request.inbound.get::<Vec<String>>(),
    ) else {
        return HandlerOutcome::Malformed;
    };
    store_value(dispatcher, request, key, ConfigValue::StringList(value))
}

fn set_int_list(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let (Ok(key), Ok(value)) = (request.inbound.get::<String>(), request.inbound.get::<Vec<u32>>())
    else {
        return HandlerOutcome::Malformed;
    };
    let value = value.into_iter().map(|v| v as i32).collect();
    store_value(dispatcher, request, key, ConfigValue::IntList(value))
}

fn store_value(
    dispatcher: &mut Dispatcher,
    request: &mut Request,
    key: String,
    value: ConfigValue,
) -> HandlerOutcome {
    dispatcher.store.set(key, value);
    request.ok();
    HandlerOutcome::Done
}

fn erase(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    let Ok(key) = request.inbound.get::<String>() else {
        return HandlerOutcome::Malformed;
    };
    if dispatcher.store.erase(&key) {
        request.ok();
    } else {
        request.fail();
    }
    HandlerOutcome::Done
}

fn flush(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    match dispatcher.store.flush() {
        Ok(()) => {
            request.ok();
        }
        Err(e) => {
            warn!("{}: config flush failed: {}", request.connection, e);
            request.fail();
        }
    }
    HandlerOutcome::Done
}

fn reload(dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    match dispatcher.store.reload() {
        Ok(()) => {
            request.ok();
        }
        Err(e) => {
            warn!("{}: config reload failed: {}", request.connection, e);
            request.fail();
        }
    }
    HandlerOutcome::Done
}
