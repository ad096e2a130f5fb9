use std::collections::BTreeMap;

use kurbo::Point;

pub use glyphs_backend_derive::ToPlist;

use crate::plist::Plist;

pub trait ToPlist {
    fn to_plist(self) -> Plist;
}

// Lets the derive skip `None` fields without special-casing `Option`.
pub trait ToPlistOpt {
    fn to_plist_opt(self) -> Option<Plist>;
}

impl ToPlist for Plist {
    fn to_plist(self) -> Plist {
        self
    }
}

impl ToPlist for String {
    fn to_plist(self) -> Plist {
        self.into()
    }
}

impl ToPlist for bool {
    fn to_plist(self) -> Plist {
        (self as i64).into()
    }
}

impl ToPlist for u16 {
    fn to_plist(self) -> Plist {
        Plist::Integer(self.into())
    }
}

impl ToPlist for i64 {
    fn to_plist(self) -> Plist {
        self.into()
    }
}

impl ToPlist for f64 {
    fn to_plist(self) -> Plist {
        // Opportunistically output integers.
        if (self - self.round()).abs() < f64::EPSILON && self.abs() < i64::MAX as f64 {
            Plist::Integer(self.round() as i64)
        } else {
            self.into()
        }
    }
}

impl ToPlist for Point {
    fn to_plist(self) -> Plist {
        Plist::Array(vec![self.x.to_plist(), self.y.to_plist()])
    }
}

impl<T: ToPlist> ToPlist for BTreeMap<String, T> {
    fn to_plist(self) -> Plist {
        Plist::Dictionary(
            self.into_iter()
                .map(|(key, value)| (key, value.to_plist()))
                .collect(),
        )
    }
}

impl<T: ToPlist> ToPlist for Vec<T> {
    fn to_plist(self) -> Plist {
        Plist::Array(self.into_iter().map(ToPlist::to_plist).collect())
    }
}

impl<T: ToPlist> ToPlistOpt for T {
    fn to_plist_opt(self) -> Option<Plist> {
        Some(ToPlist::to_plist(self))
    }
}

impl<T: ToPlist> ToPlistOpt for Option<T> {
    fn to_plist_opt(self) -> Option<Plist> {
        self.map(ToPlist::to_plist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_floats_become_integers() {
        assert_eq!(600.0f64.to_plist(), Plist::Integer(600));
        assert_eq!((-0.5f64).to_plist(), Plist::Float(-0.5));
        assert_eq!(
            Point::new(10.0, 20.5).to_plist(),
            Plist::Array(vec![Plist::Integer(10), Plist::Float(20.5)])
        );
    }
}
