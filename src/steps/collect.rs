use std::path::PathBuf;

use console::style;
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};

use crate::{
    catalog::{Catalog, TimezoneCatalog},
    config::{Browser, DesktopEnvironment, InstallConfig, UserAccount},
    error::InstallerError,
    prompt::Prompter,
    ui,
    validate::{self, Rejection},
};

// ── Catalog sources ───────────────────────────────────────────────────────────

/// Where the timezone, locale and keymap catalogs come from.
pub trait CatalogSource {
    fn timezones(&self) -> TimezoneCatalog;
    fn locales(&self) -> Result<Catalog, InstallerError>;
    fn keymaps(&self) -> Result<Catalog, InstallerError>;
}

/// The catalogs installed on the running system.
#[derive(Debug, Clone)]
pub struct SystemCatalogs {
    pub zoneinfo: PathBuf,
    pub locale_dir: PathBuf,
}

impl CatalogSource for SystemCatalogs {
    fn timezones(&self) -> TimezoneCatalog {
        TimezoneCatalog::new(&self.zoneinfo)
    }

    fn locales(&self) -> Result<Catalog, InstallerError> {
        Catalog::from_dir(&self.locale_dir)
    }

    fn keymaps(&self) -> Result<Catalog, InstallerError> {
        Catalog::keymaps()
    }
}

// ── Collection ────────────────────────────────────────────────────────────────

/// Asks for every operator-chosen field, storing each as soon as it is accepted.
pub fn run(
    config: &mut InstallConfig,
    prompter: &mut dyn Prompter,
    catalogs: &dyn CatalogSource,
) -> Result<(), InstallerError> {
    let hostname = hostname(prompter)?;
    info!(target: "collect", "Hostname set to: {}", hostname);
    config.hostname = Some(hostname);

    let name = username(prompter)?;
    info!(target: "collect", "Username set to: {}", name);
    let password = user_password(prompter)?;
    config.user = Some(UserAccount {
        name: name.clone(),
        password,
    });

    config.root_password = Some(root_password(prompter, &name)?);

    config.desktop = desktop(prompter)?;
    info!(target: "collect", "Desktop environment: {:?}", config.desktop);

    config.browsers = browsers(prompter)?;
    info!(target: "collect", "Browsers: {:?}", config.browsers);

    let tz = timezone(prompter, &catalogs.timezones())?;
    info!(target: "collect", "Timezone set to: {}", tz);
    config.timezone = Some(tz);

    let locales = load_catalog(prompter, "locale", || catalogs.locales())?;
    let locale = pick_from_catalog(
        prompter,
        &locales,
        "Language/locale (e.g. en_US, eu_ES@euro; ? to list)",
        "Invalid locale. It must exactly match an entry in the locale catalog.",
    )?;
    info!(target: "collect", "Locale set to: {}", locale);
    config.locale = Some(locale);

    let keymaps = load_catalog(prompter, "keymap", || catalogs.keymaps())?;
    let keymap = pick_from_catalog(
        prompter,
        &keymaps,
        "Keymap (e.g. us, uk, de; ? to list)",
        "Incorrect or unavailable keymap.",
    )?;
    info!(target: "collect", "Keymap set to: {}", keymap);
    config.keymap = Some(keymap);

    Ok(())
}

// ── Field prompts ─────────────────────────────────────────────────────────────

/// Reads until `validate` accepts, listing the broken rules after each miss.
fn ask_until_valid<F>(
    prompter: &mut dyn Prompter,
    prompt: &str,
    heading: &str,
    secret: bool,
    validate: F,
) -> Result<String, InstallerError>
where
    F: Fn(&str) -> Result<(), Rejection>,
{
    loop {
        let value = if secret {
            prompter.password(prompt)?
        } else {
            prompter.input(prompt)?.trim().to_string()
        };

        match validate(&value) {
            Ok(()) => return Ok(value),
            Err(rejection) => {
                debug!(target: "collect", "{} rejected: {}", heading, rejection);
                ui::print_rejection(heading, &rejection.reasons);
            }
        }
    }
}

pub fn hostname(prompter: &mut dyn Prompter) -> Result<String, InstallerError> {
    ask_until_valid(
        prompter,
        "Hostname",
        "Hostname is incorrect.",
        false,
        validate::hostname,
    )
}

pub fn username(prompter: &mut dyn Prompter) -> Result<String, InstallerError> {
    ask_until_valid(
        prompter,
        "Username (1-32 chars, lower-case, [a-z0-9_-])",
        "Invalid username. Username must:",
        false,
        validate::username,
    )
}

pub fn user_password(prompter: &mut dyn Prompter) -> Result<String, InstallerError> {
    ask_until_valid(
        prompter,
        "Password for your user (can be blank)",
        "Invalid password.",
        true,
        validate::user_password,
    )
}

/// Root password; reusing the username as password needs explicit confirmation.
pub fn root_password(prompter: &mut dyn Prompter, username: &str) -> Result<String, InstallerError> {
    loop {
        let password = ask_until_valid(
            prompter,
            "Password for root",
            "Invalid root password.",
            true,
            validate::root_password,
        )?;

        if password == username {
            warn!(target: "collect", "Root password matches the username");
            ui::print_warning("Root password shouldn't be identical to the username.");
            if !prompter.confirm("Use it anyway?", false)? {
                continue;
            }
        }
        return Ok(password);
    }
}

pub fn timezone(
    prompter: &mut dyn Prompter,
    catalog: &TimezoneCatalog,
) -> Result<String, InstallerError> {
    ask_until_valid(
        prompter,
        "Timezone (case-sensitive, e.g. Europe/London)",
        "Invalid timezone format or timezone does not exist. Examples: America/New_York, Europe/Paris",
        false,
        |tz| catalog.check(tz),
    )
}

// ── Selection helpers ─────────────────────────────────────────────────────────

/// Parses a 1-based index. Blank means "none".
pub fn parse_single_choice(input: &str, count: usize) -> Result<Option<usize>, &'static str> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let n: usize = input
        .parse()
        .map_err(|_| "Invalid input, please enter a valid number.")?;
    if (1..=count).contains(&n) {
        Ok(Some(n - 1))
    } else {
        Err("Invalid selection. Please try again.")
    }
}

/// Parses comma-separated 1-based indices. Blank means "none"; repeats collapse.
pub fn parse_multi_choice(input: &str, count: usize) -> Result<Vec<usize>, &'static str> {
    let mut picked = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let n: usize = part.parse().map_err(|_| {
            "Invalid input. Please enter numbers separated by commas (e.g. 1,2) or leave blank."
        })?;
        if !(1..=count).contains(&n) {
            return Err("Invalid selection(s). Please enter valid numbers from the list.");
        }
        if !picked.contains(&(n - 1)) {
            picked.push(n - 1);
        }
    }
    Ok(picked)
}

fn print_options<T: std::fmt::Display>(title: &str, options: &[T]) {
    println!();
    println!("  {}", style(title).white().bold());
    for (i, option) in options.iter().enumerate() {
        println!("  {}  {}", style(format!("{:>2}:", i + 1)).cyan(), option);
    }
}

pub fn desktop(prompter: &mut dyn Prompter) -> Result<Option<DesktopEnvironment>, InstallerError> {
    let options: Vec<DesktopEnvironment> = DesktopEnvironment::iter().collect();
    print_options("Desktop environments", &options);

    loop {
        let input = prompter.input("Desktop environment number (blank for none)")?;
        match parse_single_choice(&input, options.len()) {
            Ok(None) => {
                ui::print_info("No desktop environment will be set.");
                return Ok(None);
            }
            Ok(Some(i)) => {
                ui::print_success(&format!("Selected desktop environment: {}", options[i]));
                return Ok(Some(options[i]));
            }
            Err(reason) => ui::print_error(reason),
        }
    }
}

pub fn browsers(prompter: &mut dyn Prompter) -> Result<Vec<Browser>, InstallerError> {
    let options: Vec<Browser> = Browser::iter().collect();
    print_options("Browsers", &options);

    loop {
        let input = prompter.input("Browser numbers, comma separated (e.g. 1,2; blank for none)")?;
        match parse_multi_choice(&input, options.len()) {
            Ok(picked) if picked.is_empty() => {
                ui::print_info("No browsers will be installed.");
                return Ok(Vec::new());
            }
            Ok(picked) => {
                let chosen: Vec<Browser> = picked.into_iter().map(|i| options[i]).collect();
                let names: Vec<String> = chosen.iter().map(|b| b.to_string()).collect();
                ui::print_success(&format!("Selected browser(s): {}", names.join(", ")));
                return Ok(chosen);
            }
            Err(reason) => ui::print_error(reason),
        }
    }
}

// ── Catalog-backed fields ─────────────────────────────────────────────────────

/// Loads a catalog, offering a retry when the lookup fails.
fn load_catalog<F>(
    prompter: &mut dyn Prompter,
    name: &str,
    mut load: F,
) -> Result<Catalog, InstallerError>
where
    F: FnMut() -> Result<Catalog, InstallerError>,
{
    loop {
        match load() {
            Ok(catalog) if !catalog.is_empty() => return Ok(catalog),
            Ok(_) => warn!(target: "collect", "The {} catalog is empty", name),
            Err(e) => warn!(target: "collect", "Could not load the {} catalog: {}", name, e),
        }
        ui::print_warning(&format!("Could not fetch the {} list.", name));
        if !prompter.confirm(&format!("Try loading the {} list again?", name), true)? {
            return Err(InstallerError::Cancelled);
        }
    }
}

fn pick_from_catalog(
    prompter: &mut dyn Prompter,
    catalog: &Catalog,
    prompt: &str,
    reason: &'static str,
) -> Result<String, InstallerError> {
    loop {
        let value = prompter.input(prompt)?;
        let value = value.trim();
        if value == "?" {
            browse(prompter, catalog)?;
            continue;
        }
        match catalog.check(value, reason) {
            Ok(()) => return Ok(value.to_string()),
            Err(rejection) => ui::print_rejection(
                "Type ? to list the valid values.",
                &rejection.reasons,
            ),
        }
    }
}

/// Shows the catalog a page at a time until the end or until the operator stops.
fn browse(prompter: &mut dyn Prompter, catalog: &Catalog) -> Result<(), InstallerError> {
    let pages = catalog.page_count();
    let mut shown = 0;

    for index in 0..pages {
        let page = catalog.page(index);
        println!(
            "  {}",
            style(format!("{}-{} of {}:", shown + 1, shown + page.len(), catalog.len())).dim()
        );
        println!("  {}", page.join(", "));
        shown += page.len();

        if index + 1 < pages {
            let more = prompter.input("-- Enter for next page, any character + Enter to stop --")?;
            if !more.trim().is_empty() {
                break;
            }
        }
    }
    Ok(())
}

// ── Summary ───────────────────────────────────────────────────────────────────

/// Shows what will be installed and asks for the go-ahead.
pub fn confirm_summary(
    config: &InstallConfig,
    prompter: &mut dyn Prompter,
) -> Result<bool, InstallerError> {
    let ready = config.ready()?;

    let firmware = ready.firmware.to_string();
    let user_password = if ready.user.password.is_empty() {
        "(none)"
    } else {
        "(set)"
    };
    let desktop = ready
        .desktop
        .map(|d| d.to_string())
        .unwrap_or_else(|| "(none)".to_string());
    let browsers = if ready.browsers.is_empty() {
        "(none)".to_string()
    } else {
        ready
            .browsers
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let disks = config
        .disks
        .as_ref()
        .map(|m| {
            m.entries()
                .map(|(dev, mnt)| format!("{} → {}", dev, mnt))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_else(|| "(not set)".to_string());

    ui::print_kv_box(
        "Installation summary",
        &[
            ("Firmware", firmware.as_str()),
            ("Hostname", ready.hostname),
            ("Username", ready.user.name.as_str()),
            ("User password", user_password),
            ("Desktop", desktop.as_str()),
            ("Browsers", browsers.as_str()),
            ("Timezone", ready.timezone),
            ("Locale", ready.locale),
            ("Keymap", ready.keymap),
            ("Disks", disks.as_str()),
        ],
    );

    prompter.confirm("Proceed with the installation?", false)
}
