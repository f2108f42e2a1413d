//! Bluetooth adapter discovery (spec §6 CLI `--adapter`, §9 "the host-
//! transport collaborator").

use crate::error::{DeviceError, Result};

#[derive(Debug, Default, Clone)]
pub struct AdapterConfig {
    /// `hciN` name to use; the first adapter in lexicographic order is used
    /// if `None`.
    pub name: Option<String>,
}

/// Wraps the `bluer::Session`/`bluer::Adapter` pair the object-manager
/// collaborator needs, and exposes the numeric `hciN` id the raw transport
/// backend needs to bind its own socket.
#[derive(Debug)]
pub struct Adapter {
    inner: bluer::Adapter,
    session: bluer::Session,
}

impl Adapter {
    #[tracing::instrument(target = "device")]
    pub async fn open(config: AdapterConfig) -> Result<Self> {
        let session = bluer::Session::new().await?;
        let inner = match config.name {
            Some(name) => {
                if !session.adapter_names().await?.iter().any(|n| *n == name) {
                    return Err(DeviceError::NoSuchAdapter(name));
                }
                session.adapter(&name)?
            }
            None => session.default_adapter().await?,
        };
        Ok(Self { inner, session })
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Parses the numeric suffix out of `hciN`, used to bind the raw HCI
    /// socket to the same adapter bluer picked (spec §6 raw transport).
    pub fn dev_id(&self) -> Result<u16> {
        self.inner
            .name()
            .strip_prefix("hci")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| DeviceError::NoSuchAdapter(self.inner.name().to_owned()))
    }

    pub async fn set_powered(&self, flag: bool) -> Result<()> {
        self.inner.set_powered(flag).await?;
        Ok(())
    }

    pub(crate) fn bluer_adapter(&self) -> &bluer::Adapter {
        &self.inner
    }

    #[allow(dead_code)]
    pub(crate) fn bluer_session(&self) -> &bluer::Session {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_id_is_not_derivable_without_a_live_adapter() {
        // `Adapter` always wraps a live bluer handle; `dev_id` parsing is
        // exercised indirectly through `bluer::Adapter::name()`'s `hciN`
        // convention, which this module trusts rather than reimplements.
        assert_eq!("hci0".strip_prefix("hci").and_then(|n| n.parse::<u16>().ok()), Some(0));
    }
}
