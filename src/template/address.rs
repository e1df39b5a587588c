//! Address table export.
//!
//! The address table maps each active instance name to its public URL. It is
//! the only contract with downstream agent configuration.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt::Write;

use crate::state::FleetState;

/// Placeholder replaced by the instance name in URL templates.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Name to URL mapping, in fleet order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressTable {
    entries: Vec<(String, String)>,
}

/// Builds the address table for every active record.
#[must_use]
pub fn build_address_table(state: &FleetState, url_template: &str) -> AddressTable {
    AddressTable {
        entries: state
            .iter()
            .filter(|(_, record)| record.is_active())
            .map(|(name, _)| (name.to_string(), instance_url(url_template, name)))
            .collect(),
    }
}

/// Resolves the public URL of a single instance.
#[must_use]
pub fn instance_url(url_template: &str, name: &str) -> String {
    url_template.replace(NAME_PLACEHOLDER, name)
}

impl AddressTable {
    /// Looks up the URL of an instance.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, url)| url.as_str())
    }

    /// Iterates over `(name, url)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, u)| (n.as_str(), u.as_str()))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the table as a key/value block.
    #[must_use]
    pub fn to_key_value_block(&self) -> String {
        let mut output = String::from("MCP_SERVERS = {\n");
        for (name, url) in &self.entries {
            let _ = writeln!(output, "    \"{name}\": \"{url}\",");
        }
        output.push('}');
        output
    }
}

impl Serialize for AddressTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, url) in &self.entries {
            map.serialize_entry(name, url)?;
        }
        map.end()
    }
}
