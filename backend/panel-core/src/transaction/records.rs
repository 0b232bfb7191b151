//! Multi-field records carried by helper-manager replies.
//!
//! Lists go out as a `Uint32` count followed by each record's fields in
//! order.

use crate::error::codec::CodecError;
use crate::transaction::Transaction;

use common::ErrorLocation;
use models::{HelperDescriptor, IseInfo, IseMode};

use std::panic::Location;

/// `[uuid][name][module][language][icon][mode][option][locales][description]`
pub fn put_ise_info(trans: &mut Transaction, info: &IseInfo) {
    trans
        .put(&info.uuid)
        .put(&info.name)
        .put(&info.module)
        .put(&info.language)
        .put(&info.icon)
        .put(info.mode.as_str())
        .put(&info.option)
        .put(&info.locales)
        .put(&info.description);
}

pub fn get_ise_info(trans: &mut Transaction) -> Result<IseInfo, CodecError> {
    let uuid = trans.get::<String>()?;
    let name = trans.get::<String>()?;
    let module = trans.get::<String>()?;
    let language = trans.get::<String>()?;
    let icon = trans.get::<String>()?;
    let mode_name = trans.get::<String>()?;
    let mode = IseMode::parse(&mode_name).ok_or_else(|| CodecError::Malformed {
        message: format!("unknown ISE mode '{mode_name}'"),
        location: ErrorLocation::from(Location::caller()),
    })?;
    Ok(IseInfo {
        uuid,
        name,
        module,
        language,
        icon,
        mode,
        option: trans.get::<u32>()?,
        locales: trans.get::<Vec<String>>()?,
        description: trans.get::<String>()?,
    })
}

pub fn put_ise_list<'a>(trans: &mut Transaction, infos: impl IntoIterator<Item = &'a IseInfo>) {
    let infos: Vec<&IseInfo> = infos.into_iter().collect();
    trans.put(&(infos.len() as u32));
    for info in infos {
        put_ise_info(trans, info);
    }
}

pub fn get_ise_list(trans: &mut Transaction) -> Result<Vec<IseInfo>, CodecError> {
    let count = trans.get::<u32>()?;
    (0..count).map(|_| get_ise_info(trans)).collect()
}

/// `[uuid][name][icon][description][option]`
pub fn put_helper(trans: &mut Transaction, helper: &HelperDescriptor) {
    trans
        .put(&helper.uuid)
        .put(&helper.name)
        .put(&helper.icon)
        .put(&helper.description)
        .put(&helper.option);
}

pub fn put_helper_list(trans: &mut Transaction, helpers: &[HelperDescriptor]) {
    trans.put(&(helpers.len() as u32));
    for helper in helpers {
        put_helper(trans, helper);
    }
}

/// Module names are not sent; the returned descriptors carry an empty one.
pub fn get_helper_list(trans: &mut Transaction) -> Result<Vec<HelperDescriptor>, CodecError> {
    let count = trans.get::<u32>()?;
    (0..count)
        .map(|_| {
            Ok(HelperDescriptor {
                uuid: trans.get::<String>()?,
                name: trans.get::<String>()?,
                icon: trans.get::<String>()?,
                description: trans.get::<String>()?,
                option: trans.get::<u32>()?,
                module: String::new(),
            })
        })
        .collect()
}
