//! Subject identities: the things being generated.
//!
//! There is one product subject (`product`) and one subject per packaging
//! panel (`panel:<panel_id>`, e.g. `panel:front`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::validation::validate_panel_id;

/// Subject id of the product.
pub const PRODUCT_SUBJECT: &str = "product";

/// Prefix shared by every panel subject id.
pub const PANEL_PREFIX: &str = "panel:";

/// Validated identity of a generated subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// The product subject.
    pub fn product() -> Self {
        SubjectId(PRODUCT_SUBJECT.to_string())
    }

    /// A packaging panel subject. Fails if `panel_id` is malformed.
    pub fn panel(panel_id: &str) -> Result<Self, CoreError> {
        validate_panel_id(panel_id)?;
        Ok(SubjectId(format!("{PANEL_PREFIX}{panel_id}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_product(&self) -> bool {
        self.0 == PRODUCT_SUBJECT
    }

    /// The panel id for panel subjects, `None` for the product.
    pub fn panel_id(&self) -> Option<&str> {
        self.0.strip_prefix(PANEL_PREFIX)
    }
}

impl FromStr for SubjectId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == PRODUCT_SUBJECT {
            return Ok(SubjectId::product());
        }
        match s.strip_prefix(PANEL_PREFIX) {
            Some(panel_id) => SubjectId::panel(panel_id),
            None => Err(CoreError::Validation(format!("Unknown subject '{s}'"))),
        }
    }
}

impl TryFrom<String> for SubjectId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        value.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
