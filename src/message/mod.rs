//! HIP packet and parameter codec.
//!
//! Parameters are TLVs padded to a multiple of 8 bytes. Each structured
//! parameter has its own module with a nom parser and a `serialize` that
//! appends to a `Vec<u8>`; [`Parameter`] ties them to their type codes and
//! [`Packet`] adds the fixed header, checksum and HIP_MAC_3.

mod checksum;
mod dh_group_list;
mod encrypted;
mod hip_cipher;
mod host_id;
mod packet;
mod parameter;
mod puzzle;
mod r1_counter;
mod solution;

pub use checksum::{internet_checksum, packet_checksum};
pub use dh_group_list::{DhGroup, DhGroupList, MAX_DH_GROUPS};
pub use encrypted::Encrypted;
pub use hip_cipher::{CipherId, HipCipher, MAX_CIPHERS};
pub use host_id::{HostId, ALGORITHM_ECDH, MAX_DOMAIN_IDENTIFIER_LEN};
pub use packet::{Packet, PacketType, HEADER_LEN, HIP_VERSION, MAX_PACKET_LEN, NEXT_HEADER_NONE};
pub use parameter::{padded_len, Parameter, ParameterType};
pub use puzzle::{Puzzle, DEFAULT_LIFETIME};
pub use r1_counter::R1Counter;
pub use solution::Solution;

/// HIT_SUITE_LIST entry for HIP-DEX.
pub const HIT_SUITE_DEX: u8 = 0x50;
