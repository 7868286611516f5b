use serde::{Deserialize, Serialize};

use crate::color::Rgb;

/// A thread color: a display name plus its RGB value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Named {
    pub name: String,
    pub value: Rgb,
}

impl Named {
    pub fn new(name: impl Into<String>, value: Rgb) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn black() -> Self {
        Self::new("Black", Rgb(0, 0, 0))
    }
}
