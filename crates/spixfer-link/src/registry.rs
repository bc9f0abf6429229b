//! Link registry
//!
//! Buses and readiness lines are opened from short strings of the form
//! `name` or `name:key1=value1,key2=value2`.

use crate::handle::LinkHandle;
use std::collections::HashMap;

/// Parsed link parameters
pub struct LinkParams {
    /// Backend name
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl LinkParams {
    fn options(&self) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Parse a link string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
///
/// # Example
/// ```
/// use spixfer_link::parse_link_params;
///
/// let params = parse_link_params("linux_spi:dev=/dev/spidev0.0").unwrap();
/// assert_eq!(params.name, "linux_spi");
/// assert_eq!(params.params.get("dev").map(String::as_str), Some("/dev/spidev0.0"));
/// ```
pub fn parse_link_params(s: &str) -> Result<LinkParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));
    if name.is_empty() {
        return Err("Empty link name".into());
    }

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            } else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            }
        }
    }

    Ok(LinkParams {
        name: name.to_string(),
        params,
    })
}

/// Open a bus and its readiness line and create a LinkHandle
///
/// # Arguments
/// * `bus` - Bus specification (e.g., "dummy" or "linux_spi:dev=/dev/spidev0.0")
/// * `ready` - Readiness line specification (e.g., "linux_gpio:gpiochip=0,line=25").
///   The dummy bus brings its own line, so `ready` may be omitted for it.
///
/// # Example
/// ```ignore
/// let mut link = open_link("linux_spi:dev=/dev/spidev0.0", Some("linux_gpio:gpiochip=0,line=25"))?;
/// link.send_file("firmware.bin", TransferConfig::default(), None, &mut NoProgress)?;
/// ```
pub fn open_link(
    bus: &str,
    ready: Option<&str>,
) -> Result<LinkHandle, Box<dyn std::error::Error>> {
    let bus_params = parse_link_params(bus)?;
    let ready_params = ready.map(parse_link_params).transpose()?;

    match bus_params.name.as_str() {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&bus_params, ready_params.as_ref()),

        #[cfg(feature = "linux-spi")]
        "linux_spi" | "linux-spi" | "spidev" => {
            let ready_params = ready_params.ok_or(
                "linux_spi needs a readiness line.\n\
                 Usage: --ready linux_gpio:dev=/dev/gpiochipN,line=<offset>",
            )?;
            let bus = open_linux_spi(&bus_params)?;
            let (ready, ready_name) = open_ready(&ready_params)?;
            Ok(LinkHandle::new(bus, ready, "linux_spi", ready_name))
        }

        _ => Err(format!("Unknown bus: {}", bus_params.name).into()),
    }
}

#[cfg(feature = "dummy")]
fn open_dummy(
    params: &LinkParams,
    ready: Option<&LinkParams>,
) -> Result<LinkHandle, Box<dyn std::error::Error>> {
    if let Some(ready) = ready {
        if ready.name != "dummy" {
            return Err(format!(
                "The dummy bus drives its own readiness line, '{}' cannot be used with it",
                ready.name
            )
            .into());
        }
    }

    let (bus, ready) = spixfer_dummy::open_dummy(&params.options())
        .map_err(|e| format!("Invalid dummy parameters: {}", e))?;
    Ok(LinkHandle::new(bus, ready, "dummy", "dummy"))
}

#[cfg(feature = "linux-spi")]
fn open_linux_spi(
    params: &LinkParams,
) -> Result<Box<dyn spixfer_core::SpiBus>, Box<dyn std::error::Error>> {
    use spixfer_linux_spi::{parse_options, LinuxSpi};

    log::info!("Opening Linux SPI bus...");

    let config = parse_options(&params.options())
        .map_err(|e| format!("Invalid linux_spi parameters: {}", e))?;

    let bus = LinuxSpi::open(&config).map_err(|e| {
        format!(
            "Failed to open Linux SPI device: {}\n\
             Make sure the device exists and you have read/write permissions.\n\
             You may need to: sudo usermod -aG spi $USER",
            e
        )
    })?;

    Ok(Box::new(bus))
}

#[cfg(feature = "linux-spi")]
fn open_ready(
    params: &LinkParams,
) -> Result<(Box<dyn spixfer_core::ReadySignal>, &'static str), Box<dyn std::error::Error>> {
    match params.name.as_str() {
        #[cfg(feature = "linux-gpio")]
        "linux_gpio" | "linux-gpio" | "gpiochip" => {
            use spixfer_linux_gpio::{parse_options, LinuxGpioReady};

            log::info!("Opening Linux GPIO readiness line...");

            let config = parse_options(&params.options())
                .map_err(|e| format!("Invalid linux_gpio parameters: {}", e))?;
            let ready = LinuxGpioReady::open(&config).map_err(|e| {
                format!(
                    "Failed to request GPIO line: {}\n\
                     Make sure the line is not used by another consumer.",
                    e
                )
            })?;
            Ok((Box::new(ready), "linux_gpio"))
        }

        _ => Err(format!("Unknown readiness line: {}", params.name).into()),
    }
}

/// Role a backend plays in a link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Clocks frames to the peripheral
    Bus,
    /// Reads the peripheral's handshake line
    Ready,
    /// Provides both halves
    Both,
}

/// Information about a link backend
pub struct LinkInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// What the backend provides
    pub kind: LinkKind,
    /// Short description
    pub description: &'static str,
}

/// Get information about all available link backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_links() -> Vec<LinkInfo> {
    let mut links = Vec::new();

    #[cfg(feature = "dummy")]
    links.push(LinkInfo {
        name: "dummy",
        aliases: &[],
        kind: LinkKind::Both,
        description: "In-memory peripheral emulator (busy_starts=N,boot=N,busy=N,stall_after=N,fail_at=N)",
    });

    #[cfg(feature = "linux-spi")]
    links.push(LinkInfo {
        name: "linux_spi",
        aliases: &["linux-spi", "spidev"],
        kind: LinkKind::Bus,
        description: "Linux SPI device via spidev interface (dev=/dev/spidevX.Y,spispeed=<kHz>,mode=<0-3>)",
    });

    #[cfg(feature = "linux-gpio")]
    links.push(LinkInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "gpiochip"],
        kind: LinkKind::Ready,
        description: "Linux GPIO character device line (dev=/dev/gpiochipN,line=<offset>,bias=<pull-down|pull-up|disabled>)",
    });

    links
}

/// Generate a short list of link names for CLI help
pub fn link_names_short() -> String {
    let links = available_links();
    if links.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = links.iter().map(|l| l.name).collect();
    names.join(", ")
}
