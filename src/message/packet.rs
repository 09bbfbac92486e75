use nom::bytes::complete::take;
use nom::number::complete::{be_u16, be_u8};
use subtle::ConstantTimeEq;

use super::checksum::packet_checksum;
use super::{DhGroupList, HipCipher, HostId, Parameter, ParameterType, Puzzle, R1Counter, Solution};
use crate::crypto::{Cmac, BLOCK_LEN};
use crate::{Error, Hit};

/// Size of the fixed header.
pub const HEADER_LEN: usize = 40;

/// The 8-bit length field counts 8-byte words after the first 8 bytes.
pub const MAX_PACKET_LEN: usize = 8 + 255 * 8;

/// IPPROTO_NONE.
pub const NEXT_HEADER_NONE: u8 = 59;

pub const HIP_VERSION: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    I1,
    R1,
    I2,
    R2,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(PacketType::I1),
            2 => Some(PacketType::R1),
            3 => Some(PacketType::I2),
            4 => Some(PacketType::R2),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            PacketType::I1 => 1,
            PacketType::R1 => 2,
            PacketType::I2 => 3,
            PacketType::R2 => 4,
        }
    }

    /// Parameters a packet of this type must carry.
    pub fn mandatory(&self) -> &'static [ParameterType] {
        match self {
            PacketType::I1 => &[ParameterType::DhGroupList],
            PacketType::R1 => &[
                ParameterType::Puzzle,
                ParameterType::HostId,
                ParameterType::DhGroupList,
            ],
            PacketType::I2 => &[
                ParameterType::Solution,
                ParameterType::HipCipher,
                ParameterType::EncryptedKey,
                ParameterType::HostId,
                ParameterType::HipMac3,
            ],
            PacketType::R2 => &[
                ParameterType::DhGroupList,
                ParameterType::EncryptedKey,
                ParameterType::HipMac3,
            ],
        }
    }
}

/// A HIP packet: the fixed header and its parameters, in wire order.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | Next Header   | Header Length |0| Packet Type |Version| RES.|1|
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |          Checksum             |           Controls            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                Sender's Host Identity Tag (HIT)               |
/// |               Receiver's Host Identity Tag (HIT)              |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /                        HIP Parameters                         /
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    packet_type: PacketType,
    controls: u16,
    sender: Hit,
    receiver: Hit,
    parameters: Vec<Parameter>,
}

impl Packet {
    pub fn new(packet_type: PacketType, sender: Hit, receiver: Hit) -> Self {
        Packet {
            packet_type,
            controls: 0,
            sender,
            receiver,
            parameters: Vec::new(),
        }
    }

    pub fn with(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn push(&mut self, parameter: Parameter) {
        self.parameters.push(parameter);
    }

    pub fn packet_type(&self) -> PacketType {
        self.packet_type
    }

    pub fn controls(&self) -> u16 {
        self.controls
    }

    pub fn set_controls(&mut self, controls: u16) {
        self.controls = controls;
    }

    pub fn sender(&self) -> &Hit {
        &self.sender
    }

    pub fn receiver(&self) -> &Hit {
        &self.receiver
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, ty: ParameterType) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.parameter_type() == ty)
    }

    /// Fail with [`Error::MissingParameter`] unless every mandatory parameter is present.
    pub fn check_mandatory(&self) -> Result<(), Error> {
        for ty in self.packet_type.mandatory() {
            if self.parameter(*ty).is_none() {
                return Err(Error::MissingParameter(self.packet_type, *ty));
            }
        }
        Ok(())
    }

    pub fn r1_counter(&self) -> Option<&R1Counter> {
        match self.parameter(ParameterType::R1Counter)? {
            Parameter::R1Counter(v) => Some(v),
            _ => None,
        }
    }

    pub fn puzzle(&self) -> Option<&Puzzle> {
        match self.parameter(ParameterType::Puzzle)? {
            Parameter::Puzzle(v) => Some(v),
            _ => None,
        }
    }

    pub fn solution(&self) -> Option<&Solution> {
        match self.parameter(ParameterType::Solution)? {
            Parameter::Solution(v) => Some(v),
            _ => None,
        }
    }

    pub fn hip_cipher(&self) -> Option<&HipCipher> {
        match self.parameter(ParameterType::HipCipher)? {
            Parameter::HipCipher(v) => Some(v),
            _ => None,
        }
    }

    pub fn host_id(&self) -> Option<&HostId> {
        match self.parameter(ParameterType::HostId)? {
            Parameter::HostId(v) => Some(v),
            _ => None,
        }
    }

    pub fn dh_group_list(&self) -> Option<&DhGroupList> {
        match self.parameter(ParameterType::DhGroupList)? {
            Parameter::DhGroupList(v) => Some(v),
            _ => None,
        }
    }

    pub fn hip_mac(&self) -> Option<&[u8]> {
        match self.parameter(ParameterType::HipMac3)? {
            Parameter::HipMac3(v) => Some(v),
            _ => None,
        }
    }

    pub fn echo_request(&self) -> Option<&[u8]> {
        match self.parameter(ParameterType::EchoRequestUnsigned)? {
            Parameter::EchoRequestUnsigned(v) => Some(v),
            _ => None,
        }
    }

    pub fn echo_response(&self) -> Option<&[u8]> {
        match self.parameter(ParameterType::EchoResponseUnsigned)? {
            Parameter::EchoResponseUnsigned(v) => Some(v),
            _ => None,
        }
    }

    /// Parse and checksum-verify a packet.
    ///
    /// Bytes past the length given in the header are ignored. Any parameter
    /// that fails to decode fails the whole packet.
    ///
    /// The checksum detects every single-bit error. The one corruption a
    /// one's complement sum cannot see is a 16-bit word flipping between
    /// 0x0000 and 0xffff, which takes sixteen flipped bits.
    pub fn parse(input: &[u8]) -> Result<Packet, Error> {
        if input.len() < 8 {
            return Err(Error::TooShort);
        }
        let total = 8 + input[1] as usize * 8;
        if total > input.len() || total < HEADER_LEN {
            return Err(Error::TooShort);
        }
        let data = &input[..total];

        let received = u16::from_be_bytes([data[4], data[5]]);
        let computed = packet_checksum(data);
        if received != computed {
            return Err(Error::BadChecksum { computed, received });
        }

        let (rest, _next_header) = be_u8(data)?;
        let (rest, _length) = be_u8(rest)?;
        let (rest, ty) = be_u8(rest)?;
        let (rest, version) = be_u8(rest)?;
        let (rest, _checksum) = be_u16(rest)?;
        let (rest, controls) = be_u16(rest)?;
        let (rest, sender) = take(16_usize)(rest)?;
        let (mut rest, receiver) = take(16_usize)(rest)?;

        let packet_type = PacketType::from_u8(ty & 0x7f).ok_or(Error::UnknownPacketType(ty))?;
        if version >> 4 != HIP_VERSION {
            return Err(Error::UnsupportedVersion(version >> 4));
        }

        let mut parameters = Vec::new();
        while !rest.is_empty() {
            let (r, parameter) = Parameter::parse(rest)?;
            parameters.push(parameter);
            rest = r;
        }

        Ok(Packet {
            packet_type,
            controls,
            sender: Hit::from_slice(sender)?,
            receiver: Hit::from_slice(receiver)?,
            parameters,
        })
    }

    /// Append the encoded packet to `out`, length and checksum filled in.
    pub fn serialize(&self, out: &mut Vec<u8>) -> Result<(), Error> {
        let start = out.len();

        out.push(NEXT_HEADER_NONE);
        // length, filled in below
        out.push(0);
        out.push(self.packet_type.as_u8() & 0x7f);
        out.push((HIP_VERSION << 4) | 0x01);
        // checksum, filled in below
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&self.controls.to_be_bytes());
        out.extend_from_slice(self.sender.as_bytes());
        out.extend_from_slice(self.receiver.as_bytes());

        for p in &self.parameters {
            if let Err(e) = p.serialize(out) {
                out.truncate(start);
                return Err(e);
            }
        }

        let total = out.len() - start;
        if total > MAX_PACKET_LEN {
            out.truncate(start);
            return Err(Error::PacketTooLarge(total));
        }
        out[start + 1] = ((total - 8) / 8) as u8;

        let checksum = packet_checksum(&out[start..]);
        out[start + 4..start + 6].copy_from_slice(&checksum.to_be_bytes());

        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(HEADER_LEN + 256);
        self.serialize(&mut out)?;
        Ok(out)
    }

    /// HIP_MAC_3 over this packet under `key`.
    ///
    /// Covers a reconstructed header and every parameter whose type code is
    /// below HIP_MAC_3, in wire order. The length byte counts only the
    /// covered parameters.
    pub fn compute_mac(&self, key: &[u8]) -> Result<[u8; BLOCK_LEN], Error> {
        let mac_type = ParameterType::HipMac3.as_u16();

        let mut covered = Vec::new();
        for p in &self.parameters {
            if p.parameter_type().as_u16() < mac_type {
                p.serialize(&mut covered)?;
            }
        }
        let length = (HEADER_LEN + covered.len() - 8) / 8;

        let mut cmac = Cmac::new(key)?;
        cmac.update_u8(NEXT_HEADER_NONE);
        cmac.update_u8(length as u8);
        cmac.update_u8(self.packet_type.as_u8());
        cmac.update_u16(0);
        cmac.update_u16(self.controls);
        cmac.update(self.sender.as_bytes());
        cmac.update(self.receiver.as_bytes());
        cmac.update(&covered);

        Ok(cmac.finalize())
    }

    /// Recompute the tag and store it in the HIP_MAC_3 parameter.
    pub fn recalculate_mac(&mut self, key: &[u8]) -> Result<(), Error> {
        let tag = self.compute_mac(key)?;

        let Some(Parameter::HipMac3(content)) = self
            .parameters
            .iter_mut()
            .find(|p| p.parameter_type() == ParameterType::HipMac3)
        else {
            return Err(Error::MissingParameter(
                self.packet_type,
                ParameterType::HipMac3,
            ));
        };

        content.clear();
        content.extend_from_slice(&tag);
        Ok(())
    }

    /// Verify the HIP_MAC_3 tag in constant time.
    pub fn verify_mac(&self, key: &[u8]) -> Result<(), Error> {
        let Some(tag) = self.hip_mac() else {
            return Err(Error::MissingParameter(
                self.packet_type,
                ParameterType::HipMac3,
            ));
        };
        if tag.len() != BLOCK_LEN {
            return Err(Error::BadMac);
        }

        let computed = self.compute_mac(key)?;
        if bool::from(computed.ct_eq(tag)) {
            Ok(())
        } else {
            Err(Error::BadMac)
        }
    }
}
