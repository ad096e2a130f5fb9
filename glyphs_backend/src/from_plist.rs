use std::collections::BTreeMap;

use kurbo::Point;
use thiserror::Error;

pub use glyphs_backend_derive::FromPlist;

use crate::font::{InstanceTypeConversionError, MetricTypeConversionError};
use crate::glyph::{
    CodepointsConversionError, ColorConversionError, NameConversionError, NodeConversionError,
    NodeTypeParseError, PointConversionError, ScaleConversionError, ShapeConversionError,
};
use crate::plist::Plist;

/// Conversion from an owned plist value into a typed Glyphs structure.
pub trait FromPlist: Sized {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError>;
}

// Used by the derive to tell required fields from optional ones.
pub trait FromPlistOpt: Sized {
    fn from_plist_opt(plist: Option<Plist>, key: &'static str)
        -> Result<Self, GlyphsFromPlistError>;
}

impl<T: FromPlist> FromPlistOpt for T {
    fn from_plist_opt(
        plist: Option<Plist>,
        key: &'static str,
    ) -> Result<Self, GlyphsFromPlistError> {
        match plist {
            Some(plist) => T::from_plist(plist),
            None => Err(GlyphsFromPlistError::MissingField(key)),
        }
    }
}

impl<T: FromPlist> FromPlistOpt for Option<T> {
    fn from_plist_opt(
        plist: Option<Plist>,
        _key: &'static str,
    ) -> Result<Self, GlyphsFromPlistError> {
        plist.map(T::from_plist).transpose()
    }
}

impl FromPlist for Plist {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        Ok(plist)
    }
}

impl FromPlist for String {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        match plist {
            Plist::String(s) => Ok(s),
            // Unquoted names such as `1` or `2.5` read back as numbers.
            Plist::Integer(i) => Ok(i.to_string()),
            Plist::Float(f) => Ok(f.to_string()),
            _ => Err(VariantError("string").into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum BoolConversionError {
    #[error("can't convert non-integer plist value to bool")]
    WrongVariant,
    #[error("integer plist value wasn't 0 or 1: {0}")]
    BadNumber(i64),
}

impl FromPlist for bool {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        let convert_number = |n| match n {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(BoolConversionError::BadNumber(n)),
        };

        let value = match plist {
            Plist::Integer(n) => convert_number(n),
            Plist::String(s) => match s.parse::<i64>() {
                Ok(n) => convert_number(n),
                Err(_) => Err(BoolConversionError::WrongVariant),
            },
            _ => Err(BoolConversionError::WrongVariant),
        };
        Ok(value?)
    }
}

#[derive(Debug, Error)]
#[error("expected {0}")]
pub struct VariantError(pub &'static str);

impl FromPlist for i64 {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        match plist {
            Plist::Integer(i) => Ok(i),
            Plist::String(s) => s.parse().map_err(|_| VariantError("integer").into()),
            _ => Err(VariantError("integer").into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum DownsizeToU16Error {
    #[error("can't convert non-integer plist value to u16")]
    WrongVariant,
    #[error("{0} is out-of-bounds for a u16")]
    OutOfBounds(i64),
}

impl FromPlist for u16 {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        let Plist::Integer(int) = plist else {
            return Err(DownsizeToU16Error::WrongVariant.into());
        };
        Ok(int
            .try_into()
            .map_err(|_| DownsizeToU16Error::OutOfBounds(int))?)
    }
}

impl FromPlist for f64 {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        match plist {
            Plist::String(s) => s.parse().map_err(|_| VariantError("float").into()),
            plist => plist.as_f64().ok_or(VariantError("float").into()),
        }
    }
}

impl FromPlist for Point {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        let Plist::Array(tuple) = plist else {
            return Err(PointConversionError::WrongVariant.into());
        };
        if tuple.len() != 2 {
            return Err(PointConversionError::WrongVariant.into());
        }
        let x = tuple[0].as_f64().ok_or(PointConversionError::NotFloatX)?;
        let y = tuple[1].as_f64().ok_or(PointConversionError::NotFloatY)?;
        Ok(Point::new(x, y))
    }
}

impl<T: FromPlist> FromPlist for Vec<T> {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        match plist {
            Plist::Array(array) => array.into_iter().map(T::from_plist).collect(),
            _ => Err(VariantError("array").into()),
        }
    }
}

impl<T: FromPlist> FromPlist for BTreeMap<String, T> {
    fn from_plist(plist: Plist) -> Result<Self, GlyphsFromPlistError> {
        plist
            .into_dictionary()
            .ok_or(VariantError("dictionary"))?
            .into_iter()
            .map(|(key, value)| Ok((key, T::from_plist(value)?)))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum GlyphsFromPlistError {
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("unrecognised fields: {}", .0.join(", "))]
    UnrecognisedFields(Vec<String>),
    #[error("incorrect field type: {0}")]
    Variant(#[from] VariantError),
    #[error(transparent)]
    DownsizeToU16(#[from] DownsizeToU16Error),
    #[error("bad bool: {0}")]
    Bool(#[from] BoolConversionError),
    #[error("bad name: {0}")]
    Name(#[from] NameConversionError),
    #[error("bad color: {0}")]
    Color(#[from] ColorConversionError),
    #[error("bad node: {0}")]
    Node(#[from] NodeConversionError),
    #[error("bad node type: {0}")]
    NodeType(#[from] NodeTypeParseError),
    #[error("bad point: {0}")]
    Point(#[from] PointConversionError),
    #[error("bad scale: {0}")]
    Scale(#[from] ScaleConversionError),
    #[error("bad shape: {0}")]
    Shape(#[from] ShapeConversionError),
    #[error("bad codepoint(s): {0}")]
    Codepoints(#[from] CodepointsConversionError),
    #[error("bad metric type: {0}")]
    MetricType(#[from] MetricTypeConversionError),
    #[error("bad instance type: {0}")]
    InstanceType(#[from] InstanceTypeConversionError),
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;

    use super::*;

    #[test]
    fn error_on_unexpected_fields() {
        #[derive(Debug, FromPlist)]
        struct FooBar {
            _foo: String,
        }

        let with_unexpected = Plist::Dictionary(btreemap! {
            "foo".to_owned() => Plist::String("abc".to_owned()),
            "bar".to_owned() => Plist::String("def".to_owned()),
        });

        let err = TryInto::<FooBar>::try_into(with_unexpected)
            .expect_err("shouldn't succeed with unknown fields");
        let GlyphsFromPlistError::UnrecognisedFields(fields) = err else {
            panic!("wrong error variant");
        };
        assert_eq!(fields, vec![String::from("bar")]);
    }

    #[test]
    fn missing_required_field() {
        #[derive(Debug, FromPlist)]
        struct Required {
            _name: String,
            #[plist(default)]
            _count: i64,
        }

        let err = Required::from_plist(Plist::Dictionary(BTreeMap::new())).unwrap_err();
        assert!(matches!(err, GlyphsFromPlistError::MissingField("name")));
    }

    #[test]
    fn bools_from_numbers_and_strings() {
        assert!(bool::from_plist(Plist::Integer(1)).unwrap());
        assert!(!bool::from_plist(Plist::String("0".into())).unwrap());
        assert!(matches!(
            bool::from_plist(Plist::Integer(2)),
            Err(GlyphsFromPlistError::Bool(BoolConversionError::BadNumber(2)))
        ));
    }

    #[test]
    fn numeric_names_read_as_strings() {
        assert_eq!(String::from_plist(Plist::Integer(1)).unwrap(), "1");
        assert_eq!(String::from_plist(Plist::Float(2.5)).unwrap(), "2.5");
    }
}
