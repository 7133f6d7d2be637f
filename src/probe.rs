type SequenceNumberInnerType = u16;

/// Per-probe counter used to correlate a reply with its send timestamp.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct SequenceNumber(pub SequenceNumberInnerType);

impl SequenceNumber {
    pub(crate) fn start_value() -> SequenceNumber {
        // ICMPv4 sequence numbers start from 1.
        SequenceNumber(1)
    }

    /// The sequence numbers of a session with `count` probes, in send order.
    pub(crate) fn session_range(count: u16) -> impl Iterator<Item = SequenceNumber> {
        (SequenceNumber::start_value().0..=count).map(SequenceNumber)
    }
}

impl From<SequenceNumber> for SequenceNumberInnerType {
    fn from(value: SequenceNumber) -> Self {
        value.0
    }
}

impl From<SequenceNumberInnerType> for SequenceNumber {
    fn from(value: SequenceNumberInnerType) -> Self {
        SequenceNumber(value)
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

type TtlInnerType = u8;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Ttl(pub TtlInnerType);

impl From<TtlInnerType> for Ttl {
    fn from(integer: TtlInnerType) -> Self {
        Ttl(integer)
    }
}

impl From<Ttl> for TtlInnerType {
    fn from(ttl: Ttl) -> Self {
        ttl.0
    }
}

impl std::fmt::Display for Ttl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_range_is_one_through_count() {
        let range: Vec<u16> = SequenceNumber::session_range(3).map(u16::from).collect();
        assert_eq!(vec![1, 2, 3], range);
    }

    #[test]
    fn session_range_is_empty_for_zero_count() {
        assert_eq!(0, SequenceNumber::session_range(0).count());
    }

    #[test]
    fn fmt() {
        assert_eq!("8", format!("{}", Ttl(8)));
        assert_eq!("3", format!("{}", SequenceNumber(3)));
    }
}
