use nom::bytes::complete::take;
use nom::combinator::rest;
use nom::number::complete::be_u32;
use nom::IResult;

/// ENCRYPTED: an encrypted block with its IV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encrypted {
    pub iv: [u8; 16],
    pub data: Vec<u8>,
}

impl Encrypted {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Encrypted> {
        let (input, _reserved) = be_u32(input)?;
        let (input, iv_bytes) = take(16_usize)(input)?;
        let (input, data) = rest(input)?;

        let mut iv = [0u8; 16];
        iv.copy_from_slice(iv_bytes);

        Ok((
            input,
            Encrypted {
                iv,
                data: data.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.data);
    }
}
