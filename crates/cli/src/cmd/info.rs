use anyhow::Result;

use strata_lib::consts::TARGET_VENDOR;
use strata_lib::platform;

use super::SettingsArgs;
use crate::output::{OutputFormat, print_heading, print_json, print_stat};

pub fn cmd_info(args: &SettingsArgs, output: OutputFormat) -> Result<()> {
  let settings = args.settings()?;

  if output.is_json() {
    return print_json(&settings);
  }

  print_heading("System");
  match platform::Arch::current() {
    Some(host) => print_stat("Host arch", host.as_str()),
    None => print_stat("Host arch", "unsupported"),
  }
  print_stat("Root", &platform::is_root().to_string());
  println!();
  print_heading("Settings");
  print_stat("Arch", settings.arch.as_str());
  print_stat("Target", &settings.arch.target_triple(TARGET_VENDOR));
  print_stat("Base", &settings.base_dir.display().to_string());
  print_stat("Cache", &settings.cache_dir.display().to_string());
  print_stat("Max jobs", &settings.max_jobs.to_string());
  print_stat("ccache", if settings.no_ccache { "off" } else { "on" });
  print_stat("distcc", if settings.no_distcc { "off" } else { "on" });

  Ok(())
}
