//! JSON instance configuration
//!
//! ```json
//! {
//!   "arg_encoding": "utf8",
//!   "args": ["-dSAFER", "-dBATCH", "-dNOPAUSE", "-sDEVICE=png16m"],
//!   "control_paths": { "read": ["/data/in/*"], "write": ["/data/out/*"] },
//!   "activate_path_control": true,
//!   "params": { "HWResolution": 150 }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::args::ArgEncoding;
use crate::engine::Engine;
use crate::error::{GsError, Result};
use crate::instance::Instance;
use crate::params::ParamValue;
use crate::path_control::PathKind;

/// Everything needed to bring an instance from creation to a usable state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstanceConfig {
    /// Encoding of `args`
    pub arg_encoding: ArgEncoding,
    /// Devices tried when the arguments select none
    pub default_device_list: Option<String>,
    /// Init arguments, program name excluded
    pub args: Vec<String>,
    /// Permitted paths per access kind
    pub control_paths: BTreeMap<PathKind, Vec<String>>,
    /// Turn path enforcement on after init
    pub activate_path_control: bool,
    /// Parameters set after init, applied as one batch
    pub params: BTreeMap<String, ParamValue>,
}

impl InstanceConfig {
    /// Parse a configuration from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GsError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Append init arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Instance {
    /// Create, configure and initialise an instance from `config`
    ///
    /// Control paths are added before init so they also cover files opened
    /// while processing the arguments. Parameters are sent as one batch once
    /// the interpreter is fully initialised, and skipped with a warning when
    /// init stopped early.
    pub fn launch(engine: Box<dyn Engine>, config: &InstanceConfig) -> Result<Self> {
        Self::launch_with(engine, config, |_| Ok(()))
    }

    /// Like [`Instance::launch`], running `setup` just before init
    ///
    /// `setup` is where handlers that cannot live in a JSON file (stdio,
    /// poll, callouts) are installed.
    pub fn launch_with<F>(engine: Box<dyn Engine>, config: &InstanceConfig, setup: F) -> Result<Self>
    where
        F: FnOnce(&mut Instance) -> Result<()>,
    {
        let mut instance = Instance::with_engine(engine)?;

        if config.arg_encoding != ArgEncoding::default() {
            instance.set_arg_encoding(config.arg_encoding)?;
        }
        if let Some(list) = &config.default_device_list {
            instance.set_default_device_list(list)?;
        }
        for (kind, paths) in &config.control_paths {
            for path in paths {
                instance.add_control_path(*kind, path)?;
            }
        }

        setup(&mut instance)?;
        instance.init_with_args(&config.args)?;

        if !config.params.is_empty() {
            if instance.is_initialized() {
                let last = config.params.len() - 1;
                for (index, (name, value)) in config.params.iter().enumerate() {
                    instance.set_param(name, value.clone(), index < last)?;
                }
            } else {
                log::warn!("interpreter stopped during init; {} parameter(s) not applied", config.params.len());
            }
        }
        if config.activate_path_control {
            instance.activate_path_control(true)?;
        }
        Ok(instance)
    }
}
