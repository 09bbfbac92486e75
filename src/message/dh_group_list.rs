use nom::combinator::map;
use nom::multi::many0;
use nom::number::complete::be_u8;
use nom::IResult;
use tinyvec::ArrayVec;

/// Maximum number of groups kept from a DH_GROUP_LIST.
pub const MAX_DH_GROUPS: usize = 16;

/// Diffie-Hellman group identifiers (RFC 7401, RFC 9028).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DhGroup {
    NistP256,
    NistP384,
    NistP521,
    Secp160r1,
    Unknown(u8),
}

impl Default for DhGroup {
    fn default() -> Self {
        DhGroup::Unknown(0)
    }
}

impl DhGroup {
    pub fn from_u8(value: u8) -> Self {
        match value {
            7 => DhGroup::NistP256,
            8 => DhGroup::NistP384,
            9 => DhGroup::NistP521,
            10 => DhGroup::Secp160r1,
            _ => DhGroup::Unknown(value),
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            DhGroup::NistP256 => 7,
            DhGroup::NistP384 => 8,
            DhGroup::NistP521 => 9,
            DhGroup::Secp160r1 => 10,
            DhGroup::Unknown(value) => *value,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], DhGroup> {
        map(be_u8, DhGroup::from_u8)(input)
    }
}

/// DH_GROUP_LIST: the groups a host supports, in order of preference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DhGroupList {
    groups: ArrayVec<[DhGroup; MAX_DH_GROUPS]>,
}

impl DhGroupList {
    pub fn single(group: DhGroup) -> Self {
        let mut groups = ArrayVec::new();
        groups.push(group);
        DhGroupList { groups }
    }

    pub fn groups(&self) -> &[DhGroup] {
        &self.groups
    }

    pub fn contains(&self, group: DhGroup) -> bool {
        self.groups.contains(&group)
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], DhGroupList> {
        let (rest, parsed) = many0(DhGroup::parse)(input)?;
        let mut groups = ArrayVec::new();
        for g in parsed {
            if groups.try_push(g).is_some() {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::TooLarge,
                )));
            }
        }
        Ok((rest, DhGroupList { groups }))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.extend(self.groups.iter().map(|g| g.as_u8()));
    }
}

impl FromIterator<DhGroup> for DhGroupList {
    /// Groups beyond [`MAX_DH_GROUPS`] are dropped.
    fn from_iter<T: IntoIterator<Item = DhGroup>>(iter: T) -> Self {
        let groups = iter.into_iter().take(MAX_DH_GROUPS).collect();
        DhGroupList { groups }
    }
}
