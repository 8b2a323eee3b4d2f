use std::path::PathBuf;

use clap::Parser;
use ubi_driver::{DriverOptions, Profile};

pub fn parse_args() -> Args {
    Args::parse()
}

/// `ubi-machine` - manage docker hosts on Ubiquity Hosting cloud VMs
#[derive(Parser, Debug)]
#[command(author, version, about, disable_help_subcommand(true))]
pub struct Args {
    /// Directory holding machine records and SSH keys
    #[arg(
        short = 's',
        long,
        global = true,
        env = "UBI_MACHINE_STORAGE_PATH",
        default_value = ".ubi-machine"
    )]
    pub storage_path: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Parser, Debug)]
pub enum Command {
    /// Create a machine
    Create(Create),
    /// Start a machine
    Start(Target),
    /// Stop a machine
    Stop(Target),
    /// Restart a machine
    Restart(Target),
    /// Stop a machine (same as stop, the API has no forced power-off)
    Kill(Target),
    /// Remove a machine and its provider resources
    Rm(Target),
    /// Show the state of a machine
    Status(Target),
    /// Print the IP address of a machine
    Ip(Machine),
    /// Print the docker URL of a machine
    Url(Machine),
    /// Print the stored machine record as JSON
    Inspect(Machine),
    /// List the driver's create flags
    Flags,
}

#[derive(Parser, Debug)]
pub struct Machine {
    /// Machine name
    pub name: String,
}

/// A machine plus the API token needed to reach it.
#[derive(Parser, Debug)]
pub struct Target {
    /// Machine name
    pub name: String,

    /// Ubiquity API token for authentication
    #[arg(long = "ubiquity-api-token", env = "UBIQUITY_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,
}

#[derive(Parser, Debug)]
pub struct Create {
    /// Machine name
    pub name: String,

    /// Driver profile to present to the host
    #[arg(long, default_value = "ubiquity")]
    pub profile: Profile,

    #[command(flatten)]
    pub driver: DriverFlags,

    /// Seconds between instance status queries
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_secs: u64,

    /// Give up waiting for the instance address after this many seconds (0 = never)
    #[arg(long, default_value_t = 600)]
    pub create_timeout_secs: u64,
}

/// Driver options, taken from flags or the `UBIQUITY_*` env vars.
#[derive(Parser, Debug)]
pub struct DriverFlags {
    /// Ubiquity client ID for account authentication
    #[arg(long = "ubiquity-client-id", env = "UBIQUITY_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Ubiquity username for API authentication
    #[arg(long = "ubiquity-api-username", env = "UBIQUITY_API_USERNAME")]
    pub api_username: Option<String>,

    /// Ubiquity API token for authentication
    #[arg(long = "ubiquity-api-token", env = "UBIQUITY_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Ubiquity zone location for VM creation
    #[arg(long = "ubiquity-zone-id", env = "UBIQUITY_ZONE_ID", default_value = "7")]
    pub zone_id: String,

    /// Ubiquity VM size details for VM creation
    #[arg(long = "ubiquity-flavor-id", env = "UBIQUITY_FLAVOR_ID", default_value = "1")]
    pub flavor_id: String,

    /// Ubiquity VM image for VM creation
    #[arg(long = "ubiquity-image-id", env = "UBIQUITY_IMAGE_ID", default_value = "18")]
    pub image_id: String,
}

impl From<DriverFlags> for DriverOptions {
    fn from(flags: DriverFlags) -> Self {
        Self {
            client_id: flags.client_id,
            api_username: flags.api_username,
            api_token: flags.api_token,
            zone_id: Some(flags.zone_id),
            flavor_id: Some(flags.flavor_id),
            image_id: Some(flags.image_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ubi_driver::CREATE_FLAGS;

    #[test]
    fn parses_create_flags() {
        let args = Args::try_parse_from([
            "ubi-machine",
            "--storage-path",
            "/tmp/store",
            "create",
            "dev-1",
            "--profile",
            "ubiquityhosting",
            "--ubiquity-client-id",
            "4242",
            "--ubiquity-zone-id",
            "3",
        ])
        .unwrap();

        assert_eq!(args.storage_path, PathBuf::from("/tmp/store"));
        let Command::Create(create) = args.command else {
            panic!("expected create command");
        };
        assert_eq!(create.name, "dev-1");
        assert_eq!(create.profile, Profile::UbiquityHosting);
        assert_eq!(create.poll_interval_secs, 3);

        let opts = DriverOptions::from(create.driver);
        assert_eq!(opts.client_id.as_deref(), Some("4242"));
        assert_eq!(opts.zone_id.as_deref(), Some("3"));
    }

    #[test]
    fn create_defaults_match_driver_flag_table() {
        let args = Args::try_parse_from(["ubi-machine", "create", "dev-1"]).unwrap();
        let Command::Create(create) = args.command else {
            panic!("expected create command");
        };
        let opts = DriverOptions::from(create.driver);

        for (flag, value) in CREATE_FLAGS[3..]
            .iter()
            .zip([&opts.zone_id, &opts.flavor_id, &opts.image_id])
        {
            assert_eq!(value.as_deref(), flag.default, "default for --{}", flag.name);
        }
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let result = Args::try_parse_from([
            "ubi-machine",
            "create",
            "dev-1",
            "--poll-interval-secs",
            "0",
        ]);
        assert!(result.is_err());

        let args = Args::try_parse_from([
            "ubi-machine",
            "create",
            "dev-1",
            "--poll-interval-secs",
            "1",
            "--create-timeout-secs",
            "0",
        ])
        .unwrap();
        let Command::Create(create) = args.command else {
            panic!("expected create command");
        };
        assert_eq!(create.poll_interval_secs, 1);
        assert_eq!(create.create_timeout_secs, 0);
    }

    #[test]
    fn rejects_unknown_profile() {
        let result = Args::try_parse_from(["ubi-machine", "create", "dev-1", "--profile", "aws"]);
        assert!(result.is_err());
    }

    #[test]
    fn parses_target_commands() {
        let args = Args::try_parse_from([
            "ubi-machine",
            "kill",
            "dev-1",
            "--ubiquity-api-token",
            "tok",
        ])
        .unwrap();
        let Command::Kill(target) = args.command else {
            panic!("expected kill command");
        };
        assert_eq!(target.name, "dev-1");
        assert_eq!(target.api_token.as_deref(), Some("tok"));
    }
}
