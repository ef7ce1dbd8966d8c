use color_eyre::{
    config::HookBuilder,
    Result,
};
use std::panic;

/// Installs the eyre report handler and a panic hook.
///
/// Debug builds print panics through `better-panic`. Panics inside collectors
/// are caught by their supervisor, so the hook only reports and never exits.
pub fn init_errors() -> Result<()> {
    let (panic_hook, eyre_hook) = HookBuilder::default()
        .display_env_section(cfg!(debug_assertions))
        .into_hooks();
    eyre_hook.install()?;

    let panic_hook = panic_hook.into_panic_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("{panic_info}");
        if cfg!(debug_assertions) {
            better_panic::Settings::auto()
                .most_recent_first(false)
                .lineno_suffix(true)
                .verbosity(better_panic::Verbosity::Full)
                .create_panic_handler()(panic_info);
        } else {
            panic_hook(panic_info);
        }
    }));
    Ok(())
}
