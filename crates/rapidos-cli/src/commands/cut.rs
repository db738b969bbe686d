use super::{spin_fail, spin_ok, spinner, wants_spinner, ConfArgs, EXIT_SUCCESS};
use rapidos_cut::{select_toolkit, CutError};
use rapidos_schema::ManifestRegistry;
use std::path::Path;

const DEFAULT_TOOLKIT: &str = "u-root";

/// Cut `name` into `img`, then boot it when `boot_pid_dir` is given.
pub fn run(
    conf_args: &ConfArgs<'_>,
    name: &str,
    img: &Path,
    boot_pid_dir: Option<&Path>,
    toolkit: Option<&str>,
) -> Result<u8, String> {
    let registry = ManifestRegistry::with_builtin().map_err(|e| format!("manifest error: {e}"))?;
    let manifest = registry.lookup(name).ok_or_else(|| {
        let known: Vec<&str> = registry.iter().map(|m| m.name.as_str()).collect();
        format!(
            "manifest error: no manifest named '{name}', available: {}",
            known.join(", ")
        )
    })?;

    let conf = conf_args.load()?;

    let toolkit_name = toolkit.map_or_else(
        || std::env::var("RAPIDOS_TOOLKIT").unwrap_or_else(|_| DEFAULT_TOOLKIT.to_owned()),
        str::to_owned,
    );
    let toolkit = select_toolkit(&toolkit_name).map_err(|e| e.to_string())?;

    if let Some(parent) = img.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
    }

    let pb = wants_spinner(conf.debug()).then(|| spinner(&format!("cutting {name}...")));
    match rapidos_cut::cut(&conf, manifest, toolkit.as_ref(), &std::env::temp_dir(), img) {
        Ok(()) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, &format!("cut {name}"));
            }
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "cut failed");
            }
            return Err(cut_error_message(&e));
        }
    }
    println!("cut {name} image at {}", img.display());

    if let Some(pid_dir) = boot_pid_dir {
        return super::boot::boot_image(&conf, img, pid_dir);
    }
    Ok(EXIT_SUCCESS)
}

/// Config and manifest failures keep their own prefix so they map to their
/// exit codes.
fn cut_error_message(err: &CutError) -> String {
    match err {
        CutError::Config(_) | CutError::Manifest(_) => err.to_string(),
        _ => format!("failed to cut image: {err}"),
    }
}
