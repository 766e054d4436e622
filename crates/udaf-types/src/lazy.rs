//! Byte-backed view over an encoded [`Datum`], decoded on first access.

use std::sync::{Arc, OnceLock};

use crate::codec::{decode_datum, encode_datum, kind_from_tag};
use crate::datum::{Datum, DatumKind};
use crate::error::{Result, UdafError};

#[derive(Debug, Clone)]
pub struct LazyDatum {
    bytes: Arc<[u8]>,
    decoded: OnceLock<Datum>,
}

impl LazyDatum {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        LazyDatum {
            bytes: bytes.into(),
            decoded: OnceLock::new(),
        }
    }

    /// Encode `value` and wrap the result.
    pub fn encode(value: &Datum) -> Result<Self> {
        Ok(Self::new(encode_datum(value)?))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Kind of the encoded value, read from the tag byte without decoding.
    pub fn kind(&self) -> Result<DatumKind> {
        match self.bytes.first() {
            Some(&tag) => kind_from_tag(tag),
            None => Err(UdafError::InvalidPartialRepresentation(
                "empty encoded partial".to_string(),
            )),
        }
    }

    /// Decoded value; decoding happens at most once per view.
    pub fn get(&self) -> Result<&Datum> {
        if let Some(value) = self.decoded.get() {
            return Ok(value);
        }
        let value = decode_datum(&self.bytes)?;
        Ok(self.decoded.get_or_init(|| value))
    }

    pub fn is_materialized(&self) -> bool {
        self.decoded.get().is_some()
    }

    /// Fields of an encoded struct.
    pub fn fields(&self) -> Result<&[Datum]> {
        match self.get()? {
            Datum::Struct(fields) => Ok(&fields[..]),
            other => Err(UdafError::InvalidPartialRepresentation(format!(
                "expected encoded struct, found {}",
                other.kind()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_peek_does_not_decode() {
        let view = LazyDatum::encode(&Datum::Struct(Arc::from(vec![Datum::Int(1)]))).unwrap();
        assert_eq!(view.kind().unwrap(), DatumKind::Struct);
        assert!(!view.is_materialized());
        assert_eq!(view.fields().unwrap(), &[Datum::Int(1)]);
        assert!(view.is_materialized());
    }

    #[test]
    fn test_fields_on_non_struct() {
        let view = LazyDatum::encode(&Datum::Double(1.0)).unwrap();
        assert!(matches!(
            view.fields(),
            Err(UdafError::InvalidPartialRepresentation(_))
        ));
    }

    #[test]
    fn test_empty_bytes() {
        let view = LazyDatum::new(Vec::new());
        assert!(matches!(
            view.kind(),
            Err(UdafError::InvalidPartialRepresentation(_))
        ));
        assert!(view.get().is_err());
    }
}
