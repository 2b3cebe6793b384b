//! Typed message catalog for the MODULE and SYSTEM message spaces.
//!
//! Wire layouts (all fields little-endian) are taken directly from
//! `svc_dsp.c`'s `_handle_module_param_value` and sibling decoders.

use crate::ProtocolError;

/// `msg_type` value selecting the MODULE message space.
pub const MSG_TYPE_MODULE: u8 = 0;
/// `msg_type` value selecting the SYSTEM message space.
pub const MSG_TYPE_SYSTEM: u8 = 1;

/// Longest parameter name the protocol can carry, including no terminator
/// (fixed-width field, not a C string).
pub const MAX_PARAM_NAME_LENGTH: usize = 16;

macro_rules! msg_id {
    ($name:ident, $value:expr) => {
        pub const $name: u8 = $value;
    };
}

msg_id!(MODULE_GET_PARAM_VALUE, 0);
msg_id!(MODULE_SET_PARAM_VALUE, 1);
msg_id!(MODULE_PARAM_VALUE, 2);
msg_id!(MODULE_GET_PARAM_NAME, 3);
msg_id!(MODULE_PARAM_NAME, 4);

msg_id!(SYSTEM_CHECK_READY, 0);
msg_id!(SYSTEM_READY, 1);
msg_id!(SYSTEM_GET_PORT_STATE, 2);
msg_id!(SYSTEM_SET_PORT_STATE, 3);
msg_id!(SYSTEM_PORT_STATE, 4);
msg_id!(SYSTEM_GET_PROFILE, 5);
msg_id!(SYSTEM_PROFILE, 6);

fn le16(b: &[u8], offset: usize) -> Option<u16> {
    Some(u16::from_le_bytes([*b.get(offset)?, *b.get(offset + 1)?]))
}

fn le32(b: &[u8], offset: usize) -> Option<u32> {
    Some(u32::from_le_bytes([
        *b.get(offset)?,
        *b.get(offset + 1)?,
        *b.get(offset + 2)?,
        *b.get(offset + 3)?,
    ]))
}

/// `GET_PARAM_VALUE` payload: which module/parameter to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GetParamValuePayload {
    /// Target module.
    pub module_id: u16,
    /// Parameter index within the module.
    pub param_index: u16,
}

impl GetParamValuePayload {
    const LEN: usize = 4;

    fn decode(b: &[u8]) -> Result<Self, ProtocolError> {
        if b.len() != Self::LEN {
            return Err(ProtocolError::BadPayloadLength { got: b.len(), expected: Self::LEN });
        }
        Ok(Self {
            module_id: le16(b, 0).unwrap_or_default(),
            param_index: le16(b, 2).unwrap_or_default(),
        })
    }

    fn encode(&self, out: &mut heapless::Vec<u8, { crate::frame::MAX_PAYLOAD_LEN }>) {
        out.extend_from_slice(&self.module_id.to_le_bytes()).ok();
        out.extend_from_slice(&self.param_index.to_le_bytes()).ok();
    }
}

/// `SET_PARAM_VALUE` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SetParamValuePayload {
    /// Target module.
    pub module_id: u16,
    /// Parameter index within the module.
    pub param_index: u16,
    /// New value.
    pub value: i32,
}

impl SetParamValuePayload {
    const LEN: usize = 8;

    fn decode(b: &[u8]) -> Result<Self, ProtocolError> {
        if b.len() != Self::LEN {
            return Err(ProtocolError::BadPayloadLength { got: b.len(), expected: Self::LEN });
        }
        Ok(Self {
            module_id: le16(b, 0).unwrap_or_default(),
            param_index: le16(b, 2).unwrap_or_default(),
            #[allow(clippy::cast_possible_wrap)]
            value: le32(b, 4).unwrap_or_default() as i32,
        })
    }

    fn encode(&self, out: &mut heapless::Vec<u8, { crate::frame::MAX_PAYLOAD_LEN }>) {
        out.extend_from_slice(&self.module_id.to_le_bytes()).ok();
        out.extend_from_slice(&self.param_index.to_le_bytes()).ok();
        #[allow(clippy::cast_sign_loss)]
        out.extend_from_slice(&(self.value as u32).to_le_bytes()).ok();
    }
}

/// `PARAM_VALUE` response payload. Same layout as [`SetParamValuePayload`].
pub type ParamValuePayload = SetParamValuePayload;

/// `GET_PARAM_NAME` payload. Same layout as [`GetParamValuePayload`].
pub type GetParamNamePayload = GetParamValuePayload;

/// `PARAM_NAME` response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParamNamePayload {
    /// Target module.
    pub module_id: u16,
    /// Parameter index within the module.
    pub param_index: u16,
    /// Parameter name, zero-padded to [`MAX_PARAM_NAME_LENGTH`].
    pub name: [u8; MAX_PARAM_NAME_LENGTH],
}

impl ParamNamePayload {
    const LEN: usize = 4 + MAX_PARAM_NAME_LENGTH;

    fn decode(b: &[u8]) -> Result<Self, ProtocolError> {
        if b.len() != Self::LEN {
            return Err(ProtocolError::BadPayloadLength { got: b.len(), expected: Self::LEN });
        }
        let mut name = [0u8; MAX_PARAM_NAME_LENGTH];
        if let Some(src) = b.get(4..Self::LEN) {
            name.copy_from_slice(src);
        }
        Ok(Self {
            module_id: le16(b, 0).unwrap_or_default(),
            param_index: le16(b, 2).unwrap_or_default(),
            name,
        })
    }

    fn encode(&self, out: &mut heapless::Vec<u8, { crate::frame::MAX_PAYLOAD_LEN }>) {
        out.extend_from_slice(&self.module_id.to_le_bytes()).ok();
        out.extend_from_slice(&self.param_index.to_le_bytes()).ok();
        out.extend_from_slice(&self.name).ok();
    }
}

/// `SET_PORT_STATE` / `PORT_STATE` payload: the three GPIO port registers
/// the panel link lines are wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PortStatePayload {
    /// Port F register value.
    pub port_f: u16,
    /// Port G register value.
    pub port_g: u16,
    /// Port H register value.
    pub port_h: u16,
}

impl PortStatePayload {
    const LEN: usize = 6;

    fn decode(b: &[u8]) -> Result<Self, ProtocolError> {
        if b.len() != Self::LEN {
            return Err(ProtocolError::BadPayloadLength { got: b.len(), expected: Self::LEN });
        }
        Ok(Self {
            port_f: le16(b, 0).unwrap_or_default(),
            port_g: le16(b, 2).unwrap_or_default(),
            port_h: le16(b, 4).unwrap_or_default(),
        })
    }

    fn encode(&self, out: &mut heapless::Vec<u8, { crate::frame::MAX_PAYLOAD_LEN }>) {
        out.extend_from_slice(&self.port_f.to_le_bytes()).ok();
        out.extend_from_slice(&self.port_g.to_le_bytes()).ok();
        out.extend_from_slice(&self.port_h.to_le_bytes()).ok();
    }
}

/// `SET_PORT_STATE` payload. Same layout as [`PortStatePayload`].
pub type SetPortStatePayload = PortStatePayload;

/// `PROFILE` response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProfilePayload {
    /// Cycles per audio block period, measured by the DSP's frame ISR.
    pub period: u32,
    /// Cycles spent inside `module_process` for the last processed block.
    pub cycles: u32,
}

impl ProfilePayload {
    const LEN: usize = 8;

    fn decode(b: &[u8]) -> Result<Self, ProtocolError> {
        if b.len() != Self::LEN {
            return Err(ProtocolError::BadPayloadLength { got: b.len(), expected: Self::LEN });
        }
        Ok(Self { period: le32(b, 0).unwrap_or_default(), cycles: le32(b, 4).unwrap_or_default() })
    }

    fn encode(&self, out: &mut heapless::Vec<u8, { crate::frame::MAX_PAYLOAD_LEN }>) {
        out.extend_from_slice(&self.period.to_le_bytes()).ok();
        out.extend_from_slice(&self.cycles.to_le_bytes()).ok();
    }
}

/// Decoded MODULE-space message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModuleMessage {
    /// Request the current value of a parameter.
    GetParamValue(GetParamValuePayload),
    /// Set a parameter's value.
    SetParamValue(SetParamValuePayload),
    /// Reply carrying a parameter's value.
    ParamValue(ParamValuePayload),
    /// Request a parameter's display name.
    GetParamName(GetParamNamePayload),
    /// Reply carrying a parameter's display name.
    ParamName(ParamNamePayload),
}

/// Decoded SYSTEM-space message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemMessage {
    /// Ask whether the DSP has finished booting.
    CheckReady,
    /// Reply: the DSP has finished booting.
    Ready,
    /// Request a port's state.
    GetPortState,
    /// Set a port's state.
    SetPortState(SetPortStatePayload),
    /// Reply carrying a port's state.
    PortState(PortStatePayload),
    /// Request the last block's profiling counters.
    GetProfile,
    /// Reply carrying profiling counters.
    Profile(ProfilePayload),
}

/// A decoded message from either message space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    /// A MODULE-space message.
    Module(ModuleMessage),
    /// A SYSTEM-space message.
    System(SystemMessage),
}

impl Message {
    /// Decodes a message from its wire `msg_type`/`msg_id`/payload.
    pub fn decode(msg_type: u8, msg_id: u8, payload: &[u8]) -> Result<Self, ProtocolError> {
        match msg_type {
            MSG_TYPE_MODULE => Ok(Message::Module(match msg_id {
                MODULE_GET_PARAM_VALUE => ModuleMessage::GetParamValue(GetParamValuePayload::decode(payload)?),
                MODULE_SET_PARAM_VALUE => ModuleMessage::SetParamValue(SetParamValuePayload::decode(payload)?),
                MODULE_PARAM_VALUE => ModuleMessage::ParamValue(ParamValuePayload::decode(payload)?),
                MODULE_GET_PARAM_NAME => ModuleMessage::GetParamName(GetParamNamePayload::decode(payload)?),
                MODULE_PARAM_NAME => ModuleMessage::ParamName(ParamNamePayload::decode(payload)?),
                other => return Err(ProtocolError::UnknownMsgId(other)),
            })),
            MSG_TYPE_SYSTEM => Ok(Message::System(match msg_id {
                SYSTEM_CHECK_READY => SystemMessage::CheckReady,
                SYSTEM_READY => SystemMessage::Ready,
                SYSTEM_GET_PORT_STATE => SystemMessage::GetPortState,
                SYSTEM_SET_PORT_STATE => SystemMessage::SetPortState(SetPortStatePayload::decode(payload)?),
                SYSTEM_PORT_STATE => SystemMessage::PortState(PortStatePayload::decode(payload)?),
                SYSTEM_GET_PROFILE => SystemMessage::GetProfile,
                SYSTEM_PROFILE => SystemMessage::Profile(ProfilePayload::decode(payload)?),
                other => return Err(ProtocolError::UnknownMsgId(other)),
            })),
            other => Err(ProtocolError::UnknownMsgType(other)),
        }
    }

    /// Encodes this message's wire `msg_type`, `msg_id`, and payload bytes.
    pub fn encode(&self) -> (u8, u8, heapless::Vec<u8, { crate::frame::MAX_PAYLOAD_LEN }>) {
        let mut payload = heapless::Vec::new();
        let (msg_type, msg_id) = match self {
            Message::Module(m) => {
                let id = match m {
                    ModuleMessage::GetParamValue(p) => {
                        p.encode(&mut payload);
                        MODULE_GET_PARAM_VALUE
                    }
                    ModuleMessage::SetParamValue(p) => {
                        p.encode(&mut payload);
                        MODULE_SET_PARAM_VALUE
                    }
                    ModuleMessage::ParamValue(p) => {
                        p.encode(&mut payload);
                        MODULE_PARAM_VALUE
                    }
                    ModuleMessage::GetParamName(p) => {
                        p.encode(&mut payload);
                        MODULE_GET_PARAM_NAME
                    }
                    ModuleMessage::ParamName(p) => {
                        p.encode(&mut payload);
                        MODULE_PARAM_NAME
                    }
                };
                (MSG_TYPE_MODULE, id)
            }
            Message::System(s) => {
                let id = match s {
                    SystemMessage::CheckReady => SYSTEM_CHECK_READY,
                    SystemMessage::Ready => SYSTEM_READY,
                    SystemMessage::GetPortState => SYSTEM_GET_PORT_STATE,
                    SystemMessage::SetPortState(p) => {
                        p.encode(&mut payload);
                        SYSTEM_SET_PORT_STATE
                    }
                    SystemMessage::PortState(p) => {
                        p.encode(&mut payload);
                        SYSTEM_PORT_STATE
                    }
                    SystemMessage::GetProfile => SYSTEM_GET_PROFILE,
                    SystemMessage::Profile(p) => {
                        p.encode(&mut payload);
                        SYSTEM_PROFILE
                    }
                };
                (MSG_TYPE_SYSTEM, id)
            }
        };
        (msg_type, msg_id, payload)
    }

    /// True for messages that provoke a reply (`GET_*` requests and
    /// `CHECK_READY`), i.e. messages that should increment
    /// [`crate::PendingResponses`] when sent.
    #[must_use]
    pub fn expects_response(&self) -> bool {
        matches!(
            self,
            Message::Module(ModuleMessage::GetParamValue(_))
                | Message::Module(ModuleMessage::GetParamName(_))
                | Message::System(SystemMessage::CheckReady)
                | Message::System(SystemMessage::GetPortState)
                | Message::System(SystemMessage::GetProfile)
        )
    }

    /// True for messages that are themselves a reply to a previous `GET_*`
    /// or `CHECK_READY`, i.e. messages that should decrement
    /// [`crate::PendingResponses`] when received.
    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Message::Module(ModuleMessage::ParamValue(_))
                | Message::Module(ModuleMessage::ParamName(_))
                | Message::System(SystemMessage::Ready)
                | Message::System(SystemMessage::PortState(_))
                | Message::System(SystemMessage::Profile(_))
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn set_param_value_roundtrips() {
        let msg = Message::Module(ModuleMessage::SetParamValue(SetParamValuePayload {
            module_id: 3,
            param_index: 7,
            value: -42,
        }));
        let (msg_type, msg_id, payload) = msg.encode();
        let decoded = Message::decode(msg_type, msg_id, &payload).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn check_ready_has_empty_payload_and_expects_response() {
        let msg = Message::System(SystemMessage::CheckReady);
        let (msg_type, msg_id, payload) = msg.encode();
        assert!(payload.is_empty());
        assert!(msg.expects_response());
        let decoded = Message::decode(msg_type, msg_id, &payload).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn profile_roundtrips_and_is_a_response() {
        let msg = Message::System(SystemMessage::Profile(ProfilePayload { period: 1000, cycles: 300 }));
        assert!(msg.is_response());
        let (msg_type, msg_id, payload) = msg.encode();
        assert_eq!(Message::decode(msg_type, msg_id, &payload).unwrap(), msg);
    }

    #[test]
    fn unknown_msg_type_is_rejected() {
        assert_eq!(Message::decode(9, 0, &[]), Err(ProtocolError::UnknownMsgType(9)));
    }

    #[test]
    fn wrong_length_payload_is_rejected() {
        assert_eq!(
            Message::decode(MSG_TYPE_SYSTEM, SYSTEM_SET_PORT_STATE, &[1, 2]),
            Err(ProtocolError::BadPayloadLength { got: 2, expected: 6 })
        );
    }

    #[test]
    fn get_port_state_has_empty_payload_and_expects_response() {
        let msg = Message::System(SystemMessage::GetPortState);
        let (msg_type, msg_id, payload) = msg.encode();
        assert!(payload.is_empty());
        assert!(msg.expects_response());
        let decoded = Message::decode(msg_type, msg_id, &payload).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn port_state_roundtrips_and_is_a_response() {
        let msg = Message::System(SystemMessage::PortState(PortStatePayload {
            port_f: 0x1234,
            port_g: 0xabcd,
            port_h: 0x00ff,
        }));
        assert!(msg.is_response());
        let (msg_type, msg_id, payload) = msg.encode();
        assert_eq!(Message::decode(msg_type, msg_id, &payload).unwrap(), msg);
    }
}
