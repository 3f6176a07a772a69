//! GPU device selection.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("device list is empty")]
    Empty,

    #[error("invalid device id '{0}'")]
    InvalidId(String),
}

/// Availability mask over GPU slots.
///
/// Slot count is the highest requested id plus one, so device properties can
/// be indexed by GPU id even when lower ids are not benchmarked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMask {
    slots: Vec<bool>,
}

impl DeviceMask {
    /// Parse a comma separated list such as `0,1,2,3`.
    pub fn parse(list: &str) -> Result<Self, DeviceError> {
        let mut slots = Vec::new();
        for entry in list.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                if list.trim().is_empty() {
                    return Err(DeviceError::Empty);
                }
                return Err(DeviceError::InvalidId(entry.to_string()));
            }
            let id: usize = entry
                .parse()
                .map_err(|_| DeviceError::InvalidId(entry.to_string()))?;
            if slots.len() <= id {
                slots.resize(id + 1, false);
            }
            slots[id] = true;
        }
        Ok(Self { slots })
    }

    /// Number of slots, i.e. highest requested id plus one.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_enabled(&self, id: usize) -> bool {
        self.slots.get(id).copied().unwrap_or(false)
    }

    /// Enabled device ids in ascending order.
    pub fn enabled(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, &on)| on.then_some(id))
    }

    pub fn first_enabled(&self) -> Option<usize> {
        self.enabled().next()
    }
}

impl std::fmt::Display for DeviceMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.enabled().map(|id| id.to_string()).collect();
        write!(f, "{}", ids.join(","))
    }
}
