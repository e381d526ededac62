//! Polymer model fits over bounded regions and stored peaks.

use std::collections::BTreeMap;

use hk_analysis::peak::{Peak, peaks_from_value, peaks_to_value};
use hk_analysis::polymer::peak_deflection;
use hk_analysis::{PeakExtraction, PolymerModel, PolymerSettings, fit_polymer};
use hk_core::{Real, Value, join_data_label};
use tracing::debug;

use crate::argument::{ArgType, Argument, Count};
use crate::command::{Command, Params, bounds_argument, column_argument, curve_argument, stack_argument};
use crate::config::Setting;
use crate::error::{CommandResult, Failure};
use crate::hooke::Hooke;
use crate::io::CommandIo;
use crate::plugins::curve::{block_argument, block_name, column, set_column, split_label};
use crate::plugins::{from_config, opt_real};
use crate::registry::{Plugin, PluginKind};

pub const PLUGIN: Plugin = Plugin {
    name: "polymer_fit",
    kind: PluginKind::Plugin,
    dependencies: &["vclamp"],
    commands,
    settings,
};

const SECTION: &str = "polymer_fit";

/// Model options that default to the configured value.
const MODEL_OPTIONS: [(&str, ArgType, &str); 9] = [
    ("polymer model", ArgType::String, "Polymer model: WLC, FJC or FJC-PEG."),
    ("temperature", ArgType::Float, "Temperature (K)."),
    ("WLC persistence length", ArgType::Float, "Persistence length (m); None fits it."),
    ("FJC Kuhn length", ArgType::Float, "Kuhn length (m); None fits it."),
    ("FJC_PEG Kuhn length", ArgType::Float, "PEG Kuhn length (m); None fits it."),
    ("FJC_PEG elasticity", ArgType::Float, "PEG monomer elasticity (N/m)."),
    ("FJC_PEG delta G", ArgType::Float, "Helical/planar free energy difference (kBT)."),
    ("FJC_PEG L_helical", ArgType::Float, "Helical monomer length (m)."),
    ("FJC_PEG L_planar", ArgType::Float, "Planar monomer length (m)."),
];

fn settings() -> Vec<Setting> {
    let d = PolymerSettings::default();
    let values: [Value; 9] = [
        d.model.as_str().into(),
        d.temperature.into(),
        d.wlc_persistence_length.into(),
        d.fjc_kuhn_length.into(),
        d.peg_kuhn_length.into(),
        d.peg_elasticity.into(),
        d.peg_delta_g.into(),
        d.peg_l_helical.into(),
        d.peg_l_planar.into(),
    ];
    MODEL_OPTIONS
        .iter()
        .zip(values)
        .map(|((option, _, help), value)| Setting::new(SECTION, *option, value, *help))
        .collect()
}

fn model_arguments() -> Vec<Argument> {
    MODEL_OPTIONS
        .iter()
        .map(|(option, ty, help)| {
            Argument::new(*option, ty.clone())
                .callback(from_config(SECTION, *option))
                .help(format!("{help} Defaults to the configured value."))
        })
        .collect()
}

fn input_columns() -> [Argument; 3] {
    [
        block_argument(),
        column_argument(
            "distance column",
            Some("cantilever adjusted extension (m)"),
            "Extension input.",
        ),
        column_argument("deflection column", Some("deflection (N)"), "Force input."),
    ]
}

fn commands() -> Vec<Command> {
    let p = "polymer_fit";
    vec![
        Command::new("polymer fit", p, polymer_fit)
            .arg(curve_argument())
            .args(input_columns())
            .arg(column_argument(
                "output tension column",
                Some("polymer tension"),
                "Model tension output (without units).",
            ))
            .arg(
                Argument::string("fit parameters info name", Some("polymer fit"))
                    .help("Block info name for the fit parameters."),
            )
            .arg(bounds_argument())
            .arg(
                Argument::string("peak extraction method", Some(PeakExtraction::default().as_str()))
                    .help("How to report the peak deflection: convex hull, peak data or peak model."),
            )
            .args(model_arguments())
            .arg(stack_argument())
            .help("Fit a polymer model to the data between two points."),
        Command::new("polymer fit peaks", p, polymer_fit_peaks)
            .arg(curve_argument())
            .args(input_columns())
            .arg(
                Argument::string("peak info name", Some("polymer peaks"))
                    .help("Block info name of the peak list to fit."),
            )
            .arg(
                Argument::new("peak index", ArgType::Int)
                    .count(Count::Variable)
                    .help("Indices of peaks to fit; all when unset."),
            )
            .arg(
                Argument::string("peak extraction method", Some(PeakExtraction::default().as_str()))
                    .help("How to report the peak deflection: convex hull, peak data or peak model."),
            )
            .args(model_arguments())
            .arg(stack_argument())
            .help("Run `polymer fit` over every stored peak, naming output after the peak."),
        Command::new("flat peaks to polymer peaks", p, flat_peaks_to_polymer_peaks)
            .arg(curve_argument())
            .args(input_columns())
            .arg(
                Argument::string("input peak info name", Some("flat filter peaks"))
                    .help("Block info name of the rebound peaks."),
            )
            .arg(
                Argument::string("output peak info name", Some("polymer peaks"))
                    .help("Block info name for the translated peaks."),
            )
            .arg(
                Argument::new("end offset", ArgType::Int)
                    .default(-1_i64)
                    .help("Offset from each rebound start to the loading region's end."),
            )
            .arg(
                Argument::new("start fraction", ArgType::Float)
                    .default(0.2)
                    .help("Fraction of the distance between the previous rebound and this one skipped before the loading region."),
            )
            .arg(stack_argument())
            .help("Shift rebound peaks back onto the polymer loading regions before them."),
    ]
}

fn polymer_settings(params: &Params) -> CommandResult<PolymerSettings> {
    let model: PolymerModel = params.str("polymer model")?.parse()?;
    let required = |name: &str| -> CommandResult<Real> {
        opt_real(params.get(name), name)?.ok_or_else(|| Failure::invalid(name, "not configured"))
    };
    Ok(PolymerSettings {
        model,
        temperature: required("temperature")?,
        wlc_persistence_length: opt_real(params.get("WLC persistence length"), "WLC persistence length")?,
        fjc_kuhn_length: opt_real(params.get("FJC Kuhn length"), "FJC Kuhn length")?,
        peg_kuhn_length: opt_real(params.get("FJC_PEG Kuhn length"), "FJC_PEG Kuhn length")?,
        peg_elasticity: required("FJC_PEG elasticity")?,
        peg_delta_g: required("FJC_PEG delta G")?,
        peg_l_helical: required("FJC_PEG L_helical")?,
        peg_l_planar: required("FJC_PEG L_planar")?,
    })
}

fn polymer_fit(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = block_name(params, "block");
    let (dist_label, def_label) = (params.str("distance column")?, params.str("deflection column")?);
    let (_, def_unit) = split_label(def_label)?;
    let dist = column(hooke, r, block, dist_label)?;
    let def = column(hooke, r, block, def_label)?;

    let bounds = params.usize_list("bounds")?;
    let (start, stop) = (bounds[0].min(bounds[1]), bounds[0].max(bounds[1]));
    if stop > dist.len() {
        return Err(Failure::invalid(
            "bounds",
            format!("stop {stop} past the end of the data ({} points)", dist.len()),
        ));
    }
    let method: PeakExtraction = params.str("peak extraction method")?.parse()?;
    let settings = polymer_settings(params)?;

    let (x, f) = (&dist[start..stop], &def[start..stop]);
    let fit = fit_polymer(x, f, &settings)?;
    let model = fit.tension(x)?;
    let peak = peak_deflection(method, x, f, &model);
    debug!(model = %settings.model, start, stop, ?peak, "polymer fit");

    let mut info = fit.to_info();
    info.insert("peak deflection".into(), peak.into());
    info.insert("peak extraction method".into(), method.as_str().into());
    info.insert("model".into(), settings.model.as_str().into());
    let info_name = params.str("fit parameters info name")?.to_string();
    hooke.block_mut(r, block)?.info.insert(info_name, Value::Map(info));

    let mut tension = vec![Real::NAN; dist.len()];
    tension[start..stop].copy_from_slice(&model);
    let output = join_data_label(params.str("output tension column")?, &def_unit);
    set_column(hooke, r, block, &output, tension)?;
    hooke.add_to_command_stack(r, "polymer fit", params)
}

fn polymer_fit_peaks(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = block_name(params, "block");
    let info_name = params.str("peak info name")?;
    let stored = hooke
        .block(r, block)?
        .info
        .get(info_name)
        .cloned()
        .ok_or_else(|| Failure::message(format!("no '{info_name}' in block info")))?;
    let peaks = peaks_from_value(&stored)?;
    let selected = params.opt_usize_list("peak index")?;

    let mut base: BTreeMap<String, Value> = params
        .values()
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "peak info name" | "peak index" | "help"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    base.insert("curve".into(), Hooke::curve_value(r));
    base.insert("stack".into(), Value::Bool(false));
    for (i, peak) in peaks.iter().enumerate() {
        if selected.as_ref().is_some_and(|s| !s.contains(&i)) {
            continue;
        }
        let mut arguments = base.clone();
        arguments.insert(
            "bounds".into(),
            Value::from(vec![peak.index, peak.post_index()]),
        );
        arguments.insert("output tension column".into(), peak.name.as_str().into());
        arguments.insert("fit parameters info name".into(), peak.name.as_str().into());
        hooke.run_command("polymer fit", &arguments, io)?;
    }
    hooke.add_to_command_stack(r, "polymer fit peaks", params)
}

fn argmin_by(values: &[Real], key: impl Fn(Real) -> Real) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| key(**a).total_cmp(&key(**b)))
        .map(|(i, _)| i)
}

fn flat_peaks_to_polymer_peaks(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = block_name(params, "block");
    let dist = column(hooke, r, block, params.str("distance column")?)?;
    let def = column(hooke, r, block, params.str("deflection column")?)?;
    let input = params.str("input peak info name")?;
    let data = hooke.block(r, block)?;
    let stored = data.info.get(input).ok_or_else(|| {
        Failure::message(format!(
            "no '{input}' in block '{}' info (have: {:?})",
            data.name,
            data.info.keys().collect::<Vec<_>>()
        ))
    })?;
    let peaks = peaks_from_value(stored)?;
    let end_offset = params.i64("end offset")?;
    let start_fraction = params.f64("start fraction")?;

    let mut previous_stop = argmin_by(&dist, Real::abs).unwrap_or(0);
    let mut translated = Vec::with_capacity(peaks.len());
    for (i, peak) in peaks.iter().enumerate() {
        let stop = usize::try_from(peak.index as i64 + end_offset)
            .ok()
            .filter(|s| *s < dist.len())
            .ok_or_else(|| Failure::message(format!("peak {i} ends outside the data")))?;
        let dist_start = dist[previous_stop] + start_fraction * (dist[stop] - dist[previous_stop]);
        let start = argmin_by(&dist, |d| (d - dist_start).abs()).unwrap_or(0);
        let values = def.get(start..stop).map(<[Real]>::to_vec).unwrap_or_default();
        translated.push(Peak::new(format!("polymer peak {i}"), start, values));
        previous_stop = peak.post_index().min(dist.len() - 1);
    }
    let output = params.str("output peak info name")?.to_string();
    hooke
        .block_mut(r, block)?
        .info
        .insert(output, peaks_to_value(&translated));
    hooke.add_to_command_stack(r, "flat peaks to polymer peaks", params)
}
