//! Engine to client callbacks.
//!
//! Engines emit these while handling a request; the broker appends them to
//! the reply, tagged with the instance id, and the client side proxy decodes
//! them back and hands them to its callbacks.

use crate::error::codec::CodecError;
use crate::session::InstanceId;
use crate::transaction::{Opcode, Transaction, WideString};

use common::ErrorLocation;
use models::{Attribute, KeyEvent, LookupTable, Property};

use std::panic::Location;

#[derive(Debug, Clone, PartialEq)]
pub enum Callback {
    ShowPreeditString,
    HidePreeditString,
    UpdatePreeditString {
        text: String,
        attributes: Vec<Attribute>,
        caret: u32,
    },
    UpdatePreeditCaret(u32),
    ShowAuxString,
    HideAuxString,
    UpdateAuxString {
        text: String,
        attributes: Vec<Attribute>,
    },
    ShowLookupTable,
    HideLookupTable,
    UpdateLookupTable(LookupTable),
    CommitString(String),
    ForwardKeyEvent(KeyEvent),
    RegisterProperties(Vec<Property>),
    UpdateProperty(Property),
    Beep,
    StartHelper(String),
    StopHelper(String),
    SendHelperEvent {
        helper: String,
        payload: Transaction,
    },
    DeleteSurroundingText {
        offset: i32,
        length: u32,
    },
    SetSelection {
        start: u32,
        end: u32,
    },
}

impl Callback {
    pub fn opcode(&self) -> Opcode {
        match self {
            Callback::ShowPreeditString => Opcode::ShowPreeditString,
            Callback::HidePreeditString => Opcode::HidePreeditString,
            Callback::UpdatePreeditString { .. } => Opcode::UpdatePreeditString,
            Callback::UpdatePreeditCaret(_) => Opcode::UpdatePreeditCaret,
            Callback::ShowAuxString => Opcode::ShowAuxString,
            Callback::HideAuxString => Opcode::HideAuxString,
            Callback::UpdateAuxString { .. } => Opcode::UpdateAuxString,
            Callback::ShowLookupTable => Opcode::ShowLookupTable,
            Callback::HideLookupTable => Opcode::HideLookupTable,
            Callback::UpdateLookupTable(_) => Opcode::UpdateLookupTable,
            Callback::CommitString(_) => Opcode::CommitString,
            Callback::ForwardKeyEvent(_) => Opcode::ForwardKeyEvent,
            Callback::RegisterProperties(_) => Opcode::RegisterProperties,
            Callback::UpdateProperty(_) => Opcode::UpdateProperty,
            Callback::Beep => Opcode::Beep,
            Callback::StartHelper(_) => Opcode::StartHelper,
            Callback::StopHelper(_) => Opcode::StopHelper,
            Callback::SendHelperEvent { .. } => Opcode::SendHelperEvent,
            Callback::DeleteSurroundingText { .. } => Opcode::DeleteSurroundingText,
            Callback::SetSelection { .. } => Opcode::SetSelection,
        }
    }

    /// True for opcodes in the callback range other than the two
    /// continuation queries.
    pub fn is_callback_opcode(opcode: Opcode) -> bool {
        matches!(
            opcode,
            Opcode::ShowPreeditString
                | Opcode::HidePreeditString
                | Opcode::UpdatePreeditString
                | Opcode::UpdatePreeditCaret
                | Opcode::ShowAuxString
                | Opcode::HideAuxString
                | Opcode::UpdateAuxString
                | Opcode::ShowLookupTable
                | Opcode::HideLookupTable
                | Opcode::UpdateLookupTable
                | Opcode::CommitString
                | Opcode::ForwardKeyEvent
                | Opcode::RegisterProperties
                | Opcode::UpdateProperty
                | Opcode::Beep
                | Opcode::StartHelper
                | Opcode::StopHelper
                | Opcode::SendHelperEvent
                | Opcode::DeleteSurroundingText
                | Opcode::SetSelection
        )
    }

    /// Append `[opcode][Uint32 instance][arguments…]`.
    pub fn encode(&self, instance: InstanceId, trans: &mut Transaction) {
        trans.put_command(self.opcode()).put(&instance.get());
        match self {
            Callback::UpdatePreeditString {
                text,
                attributes,
                caret,
            } => {
                trans
                    .put(&WideString::new(text.as_str()))
                    .put(attributes)
                    .put(caret);
            }
            Callback::UpdatePreeditCaret(caret) => {
                trans.put(caret);
            }
            Callback::UpdateAuxString { text, attributes } => {
                trans.put(&WideString::new(text.as_str())).put(attributes);
            }
            Callback::UpdateLookupTable(table) => {
                trans.put(table);
            }
            Callback::CommitString(text) => {
                trans.put(&WideString::new(text.as_str()));
            }
            Callback::ForwardKeyEvent(key) => {
                trans.put(key);
            }
            Callback::RegisterProperties(properties) => {
                trans.put(properties);
            }
            Callback::UpdateProperty(property) => {
                trans.put(property);
            }
            Callback::StartHelper(uuid) | Callback::StopHelper(uuid) => {
                trans.put(uuid);
            }
            Callback::SendHelperEvent { helper, payload } => {
                trans.put(helper).put(payload);
            }
            Callback::DeleteSurroundingText { offset, length } => {
                trans.put(&(*offset as u32)).put(length);
            }
            Callback::SetSelection { start, end } => {
                trans.put(start).put(end);
            }
            Callback::ShowPreeditString
            | Callback::HidePreeditString
            | Callback::ShowAuxString
            | Callback::HideAuxString
            | Callback::ShowLookupTable
            | Callback::HideLookupTable
            | Callback::Beep => {}
        }
    }

    /// Decode the instance id and arguments that follow an already consumed
    /// callback opcode.
    #[track_caller]
    pub fn decode(
        opcode: Opcode,
        trans: &mut Transaction,
    ) -> Result<(InstanceId, Callback), CodecError> {
        let instance = InstanceId::new(trans.get()?);
        let callback = match opcode {
            Opcode::ShowPreeditString => Callback::ShowPreeditString,
            Opcode::HidePreeditString => Callback::HidePreeditString,
            Opcode::UpdatePreeditString => {
                let text: WideString = trans.get()?;
                let attributes = trans.get()?;
                let caret = trans.get()?;
                Callback::UpdatePreeditString {
                    text: text.0,
                    attributes,
                    caret,
                }
            }
            Opcode::UpdatePreeditCaret => Callback::UpdatePreeditCaret(trans.get()?),
            Opcode::ShowAuxString => Callback::ShowAuxString,
            Opcode::HideAuxString => Callback::HideAuxString,
            Opcode::UpdateAuxString => {
                let text: WideString = trans.get()?;
                let attributes = trans.get()?;
                Callback::UpdateAuxString {
                    text: text.0,
                    attributes,
                }
            }
            Opcode::ShowLookupTable => Callback::ShowLookupTable,
            Opcode::HideLookupTable => Callback::HideLookupTable,
            Opcode::UpdateLookupTable => Callback::UpdateLookupTable(trans.get()?),
            Opcode::CommitString => {
                let text: WideString = trans.get()?;
                Callback::CommitString(text.0)
            }
            Opcode::ForwardKeyEvent => Callback::ForwardKeyEvent(trans.get()?),
            Opcode::RegisterProperties => Callback::RegisterProperties(trans.get()?),
            Opcode::UpdateProperty => Callback::UpdateProperty(trans.get()?),
            Opcode::Beep => Callback::Beep,
            Opcode::StartHelper => Callback::StartHelper(trans.get()?),
            Opcode::StopHelper => Callback::StopHelper(trans.get()?),
            Opcode::SendHelperEvent => {
                let helper = trans.get()?;
                let payload = trans.get()?;
                Callback::SendHelperEvent { helper, payload }
            }
            Opcode::DeleteSurroundingText => {
                let offset: u32 = trans.get()?;
                let length = trans.get()?;
                Callback::DeleteSurroundingText {
                    offset: offset as i32,
                    length,
                }
            }
            Opcode::SetSelection => {
                let start = trans.get()?;
                let end = trans.get()?;
                Callback::SetSelection { start, end }
            }
            other => {
                return Err(CodecError::Malformed {
                    message: format!("{other} is not an engine callback"),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };
        Ok((instance, callback))
    }
}
