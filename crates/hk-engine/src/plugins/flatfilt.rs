//! Flat filter: keep curves with enough sharp rebounds in deflection.

use std::collections::BTreeMap;

use hk_analysis::peak::{peaks_from_value, peaks_to_value};
use hk_analysis::{PeakSettings, find_peaks};
use hk_core::{CurveRef, Real, Value};
use tracing::debug;

use crate::argument::{ArgType, Argument};
use crate::command::{Command, Params, column_argument, curve_argument, stack_argument};
use crate::config::Setting;
use crate::error::{CommandResult, Failure};
use crate::hooke::Hooke;
use crate::io::CommandIo;
use crate::plugins::curve::{block_argument, block_name, column, split_label};
use crate::plugins::from_config;
use crate::registry::{Plugin, PluginKind};

pub const PLUGIN: Plugin = Plugin {
    name: "flatfilt",
    kind: PluginKind::Plugin,
    dependencies: &["vclamp"],
    commands,
    settings,
};

const SECTION: &str = "flatfilt";

const PEAK_OPTIONS: [&str; 8] = [
    "blind window",
    "cut side",
    "stable",
    "max cut",
    "peak sides",
    "min deviations",
    "see double",
    "min points",
];

fn settings() -> Vec<Setting> {
    let d = PeakSettings::default();
    vec![
        Setting::new(SECTION, "blind window", 20e-9, "Distance (m) from the surface ignored by the filter."),
        Setting::new(SECTION, "cut side", d.cut_side.as_str(), "Side noise estimation trims: both, positive or negative."),
        Setting::new(SECTION, "stable", d.stable, "Relative std change that ends noise estimation."),
        Setting::new(SECTION, "max cut", d.max_cut, "Largest fraction of points noise estimation may trim."),
        Setting::new(SECTION, "peak sides", d.peak_sides.as_str(), "Side(s) of the noise band peaks may lie on."),
        Setting::new(SECTION, "min deviations", d.min_deviations, "Peak threshold in noise standard deviations."),
        Setting::new(SECTION, "see double", d.see_double, "Peaks closer than this many points merge."),
        Setting::new(SECTION, "min points", d.min_points, "Narrowest peak kept, in points."),
        Setting::new(SECTION, "min peaks", 4_i64, "Peaks a curve needs to pass the filter."),
    ]
}

fn peak_arguments() -> Vec<Argument> {
    let types = [
        ArgType::Float,
        ArgType::String,
        ArgType::Float,
        ArgType::Float,
        ArgType::String,
        ArgType::Float,
        ArgType::Int,
        ArgType::Int,
    ];
    PEAK_OPTIONS
        .iter()
        .zip(types)
        .map(|(option, ty)| {
            Argument::new(*option, ty)
                .callback(from_config(SECTION, *option))
                .help(format!("Peak detection '{option}'; defaults to the configured value."))
        })
        .collect()
}

fn commands() -> Vec<Command> {
    let p = "flatfilt";
    vec![
        Command::new("flat filter peaks", p, flat_filter_peaks)
            .arg(curve_argument())
            .arg(block_argument())
            .arg(column_argument("distance column", Some("surface distance (m)"), "Surface position input."))
            .arg(column_argument("deflection column", Some("deflection (N)"), "Deflection input."))
            .arg(
                Argument::string("output peak info name", Some("flat filter peaks"))
                    .help("Block info name for the peak list."),
            )
            .args(peak_arguments())
            .arg(stack_argument())
            .help("Detect peaks in the deflection derivative beyond the blind window."),
        Command::new("flat filter", p, flat_filter)
            .arg(
                Argument::string("output playlist", Some("flat filter"))
                    .help("Name of the filtered playlist."),
            )
            .arg(block_argument())
            .arg(
                Argument::new("min peaks", ArgType::Int)
                    .callback(from_config(SECTION, "min peaks"))
                    .help("Peaks a curve needs to pass; defaults to the configured value."),
            )
            .args(peak_arguments())
            .help("New playlist with the curves of the current one that show at least `min peaks` flat filter peaks."),
    ]
}

fn peak_settings(params: &Params) -> CommandResult<PeakSettings> {
    Ok(PeakSettings {
        cut_side: params.str("cut side")?.parse()?,
        stable: params.f64("stable")?,
        max_cut: params.f64("max cut")?,
        peak_sides: params.str("peak sides")?.parse()?,
        min_deviations: params.f64("min deviations")?,
        see_double: params.usize("see double")?,
        min_points: params.usize("min points")?,
    })
}

fn flat_filter_peaks(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = block_name(params, "block");
    let def_label = params.str("deflection column")?;
    let (def_name, _) = split_label(def_label)?;
    let dist = column(hooke, r, block, params.str("distance column")?)?;
    let def = column(hooke, r, block, def_label)?;
    let blind = params.f64("blind window")?;
    let settings = peak_settings(params)?;

    let start = dist
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - blind).abs().total_cmp(&(*b - blind).abs()))
        .map_or(0, |(i, _)| i);
    let slope: Vec<Real> = def[start..].windows(2).map(|w| w[1] - w[0]).collect();
    if slope.is_empty() {
        return Err(Failure::PoorFit {
            what: format!("no data past the {blind} m blind window"),
        });
    }
    let mut peaks = find_peaks(&slope, &settings)?;
    for (i, peak) in peaks.iter_mut().enumerate() {
        peak.index += start;
        peak.name = format!("flat filter of {def_name} {i}");
    }
    debug!(count = peaks.len(), start, "flat filter peaks");
    let output = params.str("output peak info name")?.to_string();
    hooke
        .block_mut(r, block)?
        .info
        .insert(output, peaks_to_value(&peaks));
    hooke.add_to_command_stack(r, "flat filter peaks", params)
}

/// Contact point, force conversion and peak detection for one curve;
/// returns the peak count.
fn count_peaks(hooke: &mut Hooke, r: CurveRef, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<usize> {
    let mut common = BTreeMap::new();
    common.insert("curve".to_string(), Hooke::curve_value(r));
    common.insert("stack".to_string(), Value::Bool(false));
    if let Some(block) = params.opt_str("block") {
        common.insert("block".to_string(), block.into());
    }
    hooke.run_command("zero surface contact point", &common, io)?;
    hooke.run_command("convert distance to force", &common, io)?;
    let mut arguments = common.clone();
    for option in PEAK_OPTIONS {
        arguments.insert(option.to_string(), params.get(option).clone());
    }
    hooke.run_command("flat filter peaks", &arguments, io)?;
    let stored = hooke
        .block(r, params.opt_str("block"))?
        .info
        .get("flat filter peaks")
        .cloned()
        .unwrap_or_default();
    Ok(peaks_from_value(&stored)?.len())
}

fn flat_filter(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let name = params.str("output playlist")?.to_string();
    let min_peaks = params.usize("min peaks")?;
    let index = hooke.filter_playlist(&name, io, &mut |hooke: &mut Hooke, r: CurveRef, io: &mut CommandIo<'_>| {
        hooke.load_curve(r, io)?;
        let count = count_peaks(hooke, r, params, io)?;
        debug!(curve = %hooke.curve(r)?.name, count, min_peaks, "flat filter");
        Ok(count >= min_peaks)
    })?;
    io.emit(hooke.playlist(index)?.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use hk_analysis::Side;

    use super::*;

    #[test]
    fn default_settings_parse() {
        let mut params = Params::default();
        let config = crate::config::Config::from_settings(&settings());
        for option in PEAK_OPTIONS {
            params.set(option, config.get(SECTION, option).cloned().unwrap_or_default());
        }
        let s = peak_settings(&params).unwrap();
        assert_eq!(s.cut_side, Side::Both);
        assert_eq!(s, PeakSettings::default());
    }
}
