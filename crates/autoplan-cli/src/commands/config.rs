use autoplan_core::SchedulingPreferences;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a preference value
    Get {
        /// Dot-separated key (e.g. "work_start", "weights.priority")
        key: String,
    },
    /// Set a preference value
    Set {
        /// Dot-separated key
        key: String,
        /// New value
        value: String,
    },
    /// List all preference values
    List {
        /// Print as JSON instead of key = value lines
        #[arg(long)]
        json: bool,
    },
    /// Reset preferences to defaults
    Reset,
    /// Print the preferences file location
    Path,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Get { key } => {
            let prefs = SchedulingPreferences::load()?;
            match prefs.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut prefs = SchedulingPreferences::load()?;
            prefs.set(&key, &value)?;
            prefs.save()?;
            println!("ok");
        }
        ConfigAction::List { json } => {
            let prefs = SchedulingPreferences::load()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&prefs)?);
            } else {
                for (key, value) in prefs.entries() {
                    println!("{key} = {value}");
                }
            }
        }
        ConfigAction::Reset => {
            SchedulingPreferences::default().save()?;
            println!("preferences reset to defaults");
        }
        ConfigAction::Path => {
            println!("{}", SchedulingPreferences::path()?.display());
        }
    }
    Ok(())
}
