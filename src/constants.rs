// src/constants.rs

/// Name of the tool's directory inside the platform config directory.
pub const CONFIG_DIR_NAME: &str = "ecmc-cmd";

/// Settings file inside the config directory.
pub const SETTINGS_FILENAME: &str = "config.toml";

/// Default file names for catalogs and stores, relative to the config directory.
pub const DEFAULT_CATALOG_FILENAME: &str = "ecmc_commands.json";
/// Derived controller-tuning catalog.
pub const DEFAULT_CONTROLLER_CATALOG_FILENAME: &str = "ecmc_commands_cntrl.json";
/// Favorites store.
pub const DEFAULT_FAVORITES_FILENAME: &str = "ecmc_favorites.json";
/// Blocklist of commands never sent.
pub const DEFAULT_BLOCKLIST_FILENAME: &str = "ecmc_blocklist.json";

/// Default command/readback PV pair under the IOC prefix.
pub const COMMAND_PV_SUFFIX: &str = "MCU-Cmd.AOUT";
/// Readback PV, processed through its `PROC` field.
pub const QUERY_PV_SUFFIX: &str = "MCU-Cmd.AINP";

/// Head of the axis configuration chain.
pub const AXIS_CHAIN_FIRST_SUFFIX: &str = "MCU-Cfg-AX-FrstObjId";

/// Record field that forces processing.
pub const PROC_FIELD: &str = "PROC";

/// Value of `<motor>-Type` for a physical axis.
pub const REAL_AXIS_TYPE: &str = "REAL";

/// Upper bound on axis chain steps.
pub const MAX_AXIS_CHAIN_STEPS: usize = 256;

/// Default timeout for PV access and dispatch, in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 2.0;

/// Configuration handler whose commands need the `Cfg.` prefix.
pub const CONFIG_HANDLER_FUNCTION: &str = "handleCfgCommand";

/// Axis-scoped runtime commands are written `Main.M<id>.<field>`.
pub const AXIS_SCOPED_HEAD: &str = "Main.M";

/// Placeholder for the axis id inside an axis-scoped command name.
pub const AXIS_SLOT: &str = "<axis>";
