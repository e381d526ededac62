//! Velocity-clamp preprocessing: contact point, force conversion,
//! cantilever removal, flattening.

use hk_analysis::peak::peaks_from_value;
use hk_analysis::poly::{polyfit, polyval};
use hk_analysis::surface::{find_contact_point_fmms, find_contact_point_wtk};
use hk_analysis::{ContactAlgorithm, SurfaceFitChecks, SurfaceOptions};
use hk_core::{CurveRef, Info, Real, Value, join_data_label};
use tracing::debug;

use crate::argument::{ArgType, Argument};
use crate::command::{Command, Params, column_argument, curve_argument, stack_argument};
use crate::config::Setting;
use crate::error::{CommandResult, Failure};
use crate::hooke::Hooke;
use crate::io::CommandIo;
use crate::plugins::curve::{block_argument, block_name, column, set_column, split_label};
use crate::registry::{Plugin, PluginKind};

pub const PLUGIN: Plugin = Plugin {
    name: "vclamp",
    kind: PluginKind::Plugin,
    dependencies: &[],
    commands,
    settings,
};

fn settings() -> Vec<Setting> {
    vec![Setting::new(
        "vclamp",
        "surface contact point algorithm",
        "wtk",
        "Contact point algorithm: wtk (bilinear fit) or fmms (baseline).",
    )]
}

fn fit_check_arguments() -> Vec<Argument> {
    let d = SurfaceFitChecks::default();
    vec![
        Argument::new("min slope ratio", ArgType::Float)
            .default(d.min_slope_ratio)
            .help("Minimum contact/non-contact slope ratio (wtk)."),
        Argument::new("min contact fraction", ArgType::Float)
            .default(d.min_contact_fraction)
            .help("Minimum fraction of points in the contact region (wtk)."),
        Argument::new("max contact fraction", ArgType::Float)
            .default(d.max_contact_fraction)
            .help("Maximum fraction of points in the contact region (wtk)."),
        Argument::new("min slope guess ratio", ArgType::Float)
            .default(d.min_slope_guess_ratio)
            .help("Minimum fitted/guessed contact slope ratio (wtk)."),
    ]
}

fn spring_constant_argument() -> Argument {
    Argument::string("spring constant info name", Some("spring constant (N/m)"))
        .help("Name of the spring constant in the block or curve info.")
}

fn commands() -> Vec<Command> {
    let p = "vclamp";
    vec![
        Command::new("zero surface contact point", p, zero_surface_contact_point)
            .arg(curve_argument())
            .arg(block_argument())
            .arg(column_argument("distance column", Some("z piezo (m)"), "Surface position input."))
            .arg(column_argument("deflection column", Some("deflection (m)"), "Deflection input."))
            .arg(column_argument(
                "output distance column",
                Some("surface distance"),
                "Surface position output (without units).",
            ))
            .arg(column_argument(
                "output deflection column",
                Some("surface deflection"),
                "Deflection output (without units).",
            ))
            .arg(
                Argument::new("ignore index", ArgType::Int)
                    .help("Ignore the non-contact residual before this index (wtk)."),
            )
            .arg(
                Argument::new("ignore after last peak info name", ArgType::String)
                    .help("Alternative to `ignore index`: end of the last peak stored under this block info name."),
            )
            .arg(
                Argument::new("force zero non-contact slope", ArgType::Bool)
                    .default(false)
                    .help("Pin the fitted non-contact slope at zero."),
            )
            .arg(
                Argument::string("distance info name", Some("surface distance offset"))
                    .help("Block info name (without units) for the distance offset."),
            )
            .arg(
                Argument::string("deflection info name", Some("surface deflection offset"))
                    .help("Block info name (without units) for the deflection offset."),
            )
            .arg(
                Argument::string("fit parameters info name", Some("surface contact fit"))
                    .help("Block info name for the contact point fit parameters."),
            )
            .args(fit_check_arguments())
            .arg(stack_argument())
            .help("Find the surface contact point and shift distance and deflection to zero there."),
        Command::new("convert distance to force", p, convert_distance_to_force)
            .arg(curve_argument())
            .arg(block_argument())
            .arg(column_argument("deflection column", Some("surface deflection (m)"), "Deflection input."))
            .arg(column_argument(
                "output deflection column",
                Some("deflection"),
                "Force output (without units).",
            ))
            .arg(spring_constant_argument())
            .arg(stack_argument())
            .help("Multiply deflection by the cantilever spring constant."),
        Command::new("remove cantilever from extension", p, remove_cantilever)
            .arg(curve_argument())
            .arg(block_argument())
            .arg(column_argument("distance column", Some("surface distance (m)"), "Surface position input."))
            .arg(column_argument("deflection column", Some("deflection (N)"), "Deflection input."))
            .arg(column_argument(
                "output distance column",
                Some("cantilever adjusted extension"),
                "Extension output (without units).",
            ))
            .arg(spring_constant_argument())
            .arg(stack_argument())
            .help("Subtract cantilever bending from the surface distance: distance - deflection / k."),
        Command::new("polynomial flatten", p, polynomial_flatten)
            .arg(curve_argument())
            .arg(block_argument())
            .arg(column_argument("distance column", Some("surface distance (m)"), "Surface position input."))
            .arg(column_argument("deflection column", Some("deflection (N)"), "Deflection input."))
            .arg(column_argument(
                "output deflection column",
                Some("flattened deflection"),
                "Deflection output (without units).",
            ))
            .arg(
                Argument::new("degree", ArgType::Int)
                    .default(1_i64)
                    .help("Order of the flattening polynomial."),
            )
            .arg(Argument::string("fit info name", Some("flatten fit")).help("Block info name for the fit."))
            .arg(stack_argument())
            .help("Subtract a polynomial fitted to the non-contact region (positive distance)."),
    ]
}

fn contact_algorithm(hooke: &Hooke) -> CommandResult<ContactAlgorithm> {
    let setting = hooke.setting("vclamp", "surface contact point algorithm");
    Ok(setting.as_str().unwrap_or("wtk").parse()?)
}

/// Spring constant from the block info, falling back to the curve info.
fn spring_constant(hooke: &Hooke, r: CurveRef, block: Option<&str>, name: &str) -> CommandResult<Real> {
    let from_block = hooke.block(r, block)?.info.get(name).and_then(Value::as_f64);
    from_block
        .or_else(|| hooke.curve(r).ok()?.info.get(name).and_then(Value::as_f64))
        .ok_or_else(|| Failure::message(format!("no '{name}' in block or curve info")))
}

fn zero_surface_contact_point(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = block_name(params, "block");
    let (dist_label, def_label) = (params.str("distance column")?, params.str("deflection column")?);
    let (_, dist_unit) = split_label(dist_label)?;
    let (_, def_unit) = split_label(def_label)?;
    let dist = column(hooke, r, block, dist_label)?;
    let def = column(hooke, r, block, def_label)?;

    let ignore = match (
        params.opt_usize("ignore index"),
        params.opt_str("ignore after last peak info name"),
    ) {
        (Some(index), _) => Some(index),
        (None, Some(name)) => {
            let stored = hooke.block(r, block)?.info.get(name).cloned().unwrap_or_default();
            let peaks = peaks_from_value(&stored)?;
            let last = peaks
                .last()
                .ok_or_else(|| Failure::message(format!("need at least one peak in '{name}'")))?;
            Some(last.post_index())
        }
        (None, None) => None,
    };
    let options = SurfaceOptions {
        force_zero_non_contact_slope: params.bool("force zero non-contact slope")?,
        ignore_non_contact_before_index: ignore,
        checks: SurfaceFitChecks {
            min_slope_ratio: params.f64("min slope ratio")?,
            min_contact_fraction: params.f64("min contact fraction")?,
            max_contact_fraction: params.f64("max contact fraction")?,
            min_slope_guess_ratio: params.f64("min slope guess ratio")?,
        },
    };
    let algorithm = contact_algorithm(hooke)?;
    let contact = match algorithm {
        ContactAlgorithm::Wtk => find_contact_point_wtk(&dist, &def, options)?,
        ContactAlgorithm::Fmms => find_contact_point_fmms(&dist, &def)?,
    };
    let dist_offset = dist[contact.index];
    debug!(%algorithm, index = contact.index, dist_offset, "surface contact point");

    let data = hooke.block_mut(r, block)?;
    data.info.insert(
        join_data_label(params.str("distance info name")?, &dist_unit),
        Value::from(dist_offset),
    );
    data.info.insert(
        join_data_label(params.str("deflection info name")?, &def_unit),
        Value::from(contact.deflection_offset),
    );
    data.info.insert(
        params.str("fit parameters info name")?.to_string(),
        Value::Map(contact.info),
    );
    let out_dist = join_data_label(params.str("output distance column")?, &dist_unit);
    let out_def = join_data_label(params.str("output deflection column")?, &def_unit);
    set_column(hooke, r, block, &out_dist, dist.iter().map(|d| d - dist_offset).collect())?;
    set_column(
        hooke,
        r,
        block,
        &out_def,
        def.iter().map(|d| d - contact.deflection_offset).collect(),
    )?;
    hooke.add_to_command_stack(r, "zero surface contact point", params)
}

fn convert_distance_to_force(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = block_name(params, "block");
    let def_label = params.str("deflection column")?;
    let (_, in_unit) = split_label(def_label)?;
    let out_unit = "N";
    let output = join_data_label(params.str("output deflection column")?, out_unit);
    let k_name = params.str("spring constant info name")?;
    let (_, k_unit) = split_label(k_name)?;
    if k_unit != format!("{out_unit}/{in_unit}") {
        return Err(Failure::message(format!(
            "cannot convert from {def_label} to {output} with {k_name}"
        )));
    }
    let k = spring_constant(hooke, r, block, k_name)?;
    let def = column(hooke, r, block, def_label)?;
    set_column(hooke, r, block, &output, def.iter().map(|d| d * k).collect())?;
    hooke.add_to_command_stack(r, "convert distance to force", params)
}

fn remove_cantilever(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = block_name(params, "block");
    let (dist_label, def_label) = (params.str("distance column")?, params.str("deflection column")?);
    let (_, dist_unit) = split_label(dist_label)?;
    let (_, def_unit) = split_label(def_label)?;
    let output = join_data_label(params.str("output distance column")?, &dist_unit);
    let k = if dist_unit == def_unit {
        1.0
    } else {
        let k_name = params.str("spring constant info name")?;
        let (_, k_unit) = split_label(k_name)?;
        if k_unit != format!("{def_unit}/{dist_unit}") {
            return Err(Failure::message(format!(
                "cannot convert from {def_label} to {output} with {k_name}"
            )));
        }
        spring_constant(hooke, r, block, k_name)?
    };
    let dist = column(hooke, r, block, dist_label)?;
    let def = column(hooke, r, block, def_label)?;
    let values = dist.iter().zip(&def).map(|(x, d)| x - d / k).collect();
    set_column(hooke, r, block, &output, values)?;
    hooke.add_to_command_stack(r, "remove cantilever from extension", params)
}

fn polynomial_flatten(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = block_name(params, "block");
    let (dist_label, def_label) = (params.str("distance column")?, params.str("deflection column")?);
    let (_, def_unit) = split_label(def_label)?;
    let degree = params.usize("degree")?;
    let dist = column(hooke, r, block, dist_label)?;
    let def = column(hooke, r, block, def_label)?;

    let non_contact: Vec<bool> = dist.iter().map(|d| *d > 0.0).collect();
    let (x, y): (Vec<Real>, Vec<Real>) = dist
        .iter()
        .zip(&def)
        .zip(&non_contact)
        .filter(|(_, keep)| **keep)
        .map(|((x, y), _)| (*x, *y))
        .unzip();
    if x.is_empty() {
        return Err(Failure::message(format!("no positive distances in '{dist_label}'")));
    }
    let coeffs = polyfit(&x, &y, degree)?;
    let error = x
        .iter()
        .zip(&y)
        .map(|(x, y)| (polyval(&coeffs, *x) - y).abs())
        .sum::<Real>()
        / x.len() as Real;
    let constant = coeffs.last().copied().unwrap_or(0.0);
    let flattened = dist
        .iter()
        .zip(&def)
        .zip(&non_contact)
        .map(|((x, y), keep)| if *keep { y - polyval(&coeffs, *x) } else { y - constant })
        .collect();

    let mut fit = Info::new();
    fit.insert("error".into(), Value::from(error));
    fit.insert("degree".into(), Value::from(degree));
    fit.insert("polynomial values".into(), Value::from(coeffs));
    let info_name = params.str("fit info name")?.to_string();
    hooke.block_mut(r, block)?.info.insert(info_name, Value::Map(fit));
    let output = join_data_label(params.str("output deflection column")?, &def_unit);
    set_column(hooke, r, block, &output, flattened)?;
    hooke.add_to_command_stack(r, "polynomial flatten", params)
}
