//! Macros for accessing the interior of CBOR values without panicking.
//! Each asserts the shell type the caller expects and yields a `Result`
//! so that malformed input is always a recoverable error.

macro_rules! cbor_try_map {
    ($value:expr) => {{
        match $value {
            serde_cbor_2::Value::Map(m) => Ok(m),
            _ => {
                trace!("invalid type, expected cbor map");
                Err($crate::error::Rejection::COSEKeyInvalidCBORValue)
            }
        }
    }};
}

macro_rules! cbor_try_array {
    ($value:expr) => {{
        match $value {
            serde_cbor_2::Value::Array(a) => Ok(a),
            _ => {
                trace!("invalid type, expected cbor array");
                Err($crate::error::Rejection::COSEKeyInvalidCBORValue)
            }
        }
    }};
}

macro_rules! cbor_try_bytes {
    ($value:expr) => {{
        match $value {
            serde_cbor_2::Value::Bytes(b) => Ok(b),
            _ => {
                trace!("invalid type, expected cbor bytes");
                Err($crate::error::Rejection::COSEKeyInvalidCBORValue)
            }
        }
    }};
}

macro_rules! cbor_try_i128 {
    ($value:expr) => {{
        match $value {
            serde_cbor_2::Value::Integer(i) => Ok(*i),
            _ => {
                trace!("invalid type, expected cbor integer");
                Err($crate::error::Rejection::COSEKeyInvalidCBORValue)
            }
        }
    }};
}
