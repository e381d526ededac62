//! Curve inspection and column arithmetic.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use hk_analysis::calculus::{central_weights, derivative as weighted_derivative};
use hk_core::{CurveRef, Info, Real, Value, join_data_label, pp_si, split_data_label};
use hk_curve::driver::write_block;
use tracing::debug;

use crate::argument::{ArgType, Argument, Count, yaml_to_value};
use crate::command::{Command, Params, column_argument, curve_argument, stack_argument};
use crate::error::{CommandResult, Failure};
use crate::hooke::Hooke;
use crate::io::CommandIo;
use crate::plugins::lookup_nested;
use crate::registry::{Plugin, PluginKind, no_settings};

pub const PLUGIN: Plugin = Plugin {
    name: "curve",
    kind: PluginKind::Builtin,
    dependencies: &[],
    commands,
    settings: no_settings,
};

const CURVE_INFO_FIELDS: [&str; 8] = [
    "name",
    "path",
    "driver",
    "note",
    "command stack",
    "blocks",
    "block names",
    "block sizes",
];

pub(crate) fn block_argument() -> Argument {
    Argument::new("block", ArgType::String).help("Data block to act on; defaults to the first block.")
}

fn commands() -> Vec<Command> {
    let p = "curve";
    let mut info_flags: Vec<Argument> = vec![Argument::new("all", ArgType::Bool)
        .default(false)
        .help("Show every field.")];
    info_flags.extend(
        CURVE_INFO_FIELDS
            .iter()
            .map(|f| Argument::new(*f, ArgType::Bool).default(false).help(format!("Show the {f}."))),
    );
    vec![
        Command::new("get curve", p, get_curve)
            .arg(curve_argument())
            .help("Print the curve's name and path."),
        Command::new("curve info", p, curve_info)
            .arg(curve_argument())
            .args(info_flags)
            .help("Print information about a curve. With no field selected, show them all."),
        Command::new("block info", p, block_info)
            .arg(curve_argument())
            .arg(block_argument())
            .arg(
                Argument::new("key", ArgType::String)
                    .count(Count::Variable)
                    .required()
                    .help("Dotted key paths into the block info, e.g. `polymer fit.contour length (m)`."),
            )
            .arg(Argument::new("output", ArgType::Path).help("Append the values to this YAML file."))
            .help("Print selected values from a block's info."),
        Command::new("delta", p, delta)
            .arg(curve_argument())
            .arg(block_argument())
            .arg(
                Argument::new("point", ArgType::Point)
                    .count(Count::Exactly(2))
                    .required()
                    .help("Indices of points A and B."),
            )
            .arg(
                Argument::new("SI", ArgType::Bool)
                    .default(false)
                    .help("Pretty-print with SI prefixes."),
            )
            .help("Difference A - B between two rows, per column."),
        Command::new("export block", p, export_block)
            .arg(curve_argument())
            .arg(block_argument())
            .arg(Argument::new("output", ArgType::Path).default("curve.dat").help("Output file."))
            .arg(
                Argument::new("header", ArgType::Bool)
                    .default(true)
                    .help("Start the file with a `#` line naming the columns."),
            )
            .help("Write a data block as tab-delimited text."),
        Command::new("difference", p, difference)
            .arg(curve_argument())
            .arg(Argument::new("block A", ArgType::String).help("Block holding column A; defaults to the first block."))
            .arg(Argument::new("block B", ArgType::String).help("Block holding column B; defaults to block A."))
            .arg(Argument::new("column A", ArgType::String).required().help("Minuend column."))
            .arg(Argument::new("column B", ArgType::String).required().help("Subtrahend column."))
            .arg(column_argument(
                "output column",
                None,
                "Column (in block A) for A - B; named from the inputs by default.",
            ))
            .arg(stack_argument())
            .help("Subtract one column from another."),
        Command::new("derivative", p, derivative)
            .arg(curve_argument())
            .arg(block_argument())
            .arg(Argument::new("x column", ArgType::String).required().help("Independent variable."))
            .arg(Argument::new("f column", ArgType::String).required().help("Dependent variable."))
            .arg(column_argument(
                "output column",
                None,
                "Column for df/dx; named from the inputs by default.",
            ))
            .arg(
                Argument::new("weights", ArgType::Dict)
                    .default(Value::Map(
                        central_weights()
                            .into_iter()
                            .map(|(k, w)| (k.to_string(), Value::from(w)))
                            .collect(),
                    ))
                    .help("Offset -> weight finite-difference stencil."),
            )
            .arg(stack_argument())
            .help("Weighted finite-difference derivative of one column with respect to another."),
        Command::new("scaled column addition", p, scaled_column_addition)
            .arg(curve_argument())
            .arg(block_argument())
            .arg(column_argument("input column 1", Some("input column (m)"), "First input column."))
            .arg(column_argument("input column 2", None, "Second input column."))
            .arg(column_argument("output column", Some("output column (m)"), "Output column."))
            .args(
                ["scale 1", "scale 2", "constant"]
                    .into_iter()
                    .flat_map(|name| {
                        [
                            Argument::new(name, ArgType::Float).help(format!("Value for {name}.")),
                            Argument::new(format!("{name} name"), ArgType::String)
                                .help(format!("`|`-separated block info path for {name}.")),
                        ]
                    }),
            )
            .arg(stack_argument())
            .help("output = A * input 1 + B * input 2 + C."),
        Command::new("clear curve command stack", p, clear_command_stack)
            .arg(curve_argument())
            .help("Forget the commands recorded on a curve."),
    ]
}

// ---- shared column helpers ----

pub(crate) fn block_name<'p>(params: &'p Params, argument: &str) -> Option<&'p str> {
    params.opt_str(argument)
}

pub(crate) fn column(hooke: &Hooke, r: CurveRef, block: Option<&str>, name: &str) -> CommandResult<Vec<Real>> {
    Ok(hooke.block(r, block)?.column(name)?)
}

pub(crate) fn set_column(
    hooke: &mut Hooke,
    r: CurveRef,
    block: Option<&str>,
    name: &str,
    values: Vec<Real>,
) -> CommandResult<()> {
    debug!(column = name, "setting column");
    Ok(hooke.block_mut(r, block)?.set_column(name, values)?)
}

pub(crate) fn split_label(label: &str) -> CommandResult<(String, String)> {
    Ok(split_data_label(label)?)
}

// ---- commands ----

fn get_curve(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, false)?;
    let curve = hooke.curve(r)?;
    let mut map = Info::new();
    map.insert("name".into(), curve.name.as_str().into());
    map.insert("path".into(), curve.path.display().to_string().into());
    io.emit(map);
    Ok(())
}

fn curve_info(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let mut wanted: Vec<&str> = CURVE_INFO_FIELDS
        .iter()
        .copied()
        .filter(|f| params.get(f).as_bool() == Some(true))
        .collect();
    if params.bool("all")? || wanted.is_empty() {
        wanted = CURVE_INFO_FIELDS.to_vec();
    }
    let needs_data = wanted.iter().any(|f| f.starts_with("block"));
    let r = hooke.resolve_curve(params, io, needs_data)?;
    let curve = hooke.curve(r)?;
    let mut map = Info::new();
    for field in wanted {
        let value: Value = match field {
            "name" => curve.name.as_str().into(),
            "path" => curve.path.display().to_string().into(),
            "driver" => curve.driver.clone().into(),
            "note" => curve.note().into(),
            "command stack" => yaml_to_value(serde_yaml::to_value(&curve.command_stack)?),
            "blocks" => curve.data()?.len().into(),
            "block names" => Value::List(curve.data()?.iter().map(|d| d.name.as_str().into()).collect()),
            "block sizes" => Value::List(
                curve
                    .data()?
                    .iter()
                    .map(|d| Value::from(vec![d.nrows(), d.ncols()]))
                    .collect(),
            ),
            _ => continue,
        };
        map.insert(field.to_string(), value);
    }
    io.emit(map);
    Ok(())
}

fn block_info(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = hooke.block(r, block_name(params, "block"))?;
    let keys = params
        .get("key")
        .as_list()
        .ok_or_else(|| Failure::invalid("key", "expected a list of keys"))?;
    let mut values = Info::new();
    for key in keys.iter().filter_map(Value::as_str) {
        let value = lookup_nested(&block.info, key, '.')
            .ok_or_else(|| Failure::message(format!("block '{}' has no info '{key}'", block.name)))?;
        values.insert(key.to_string(), value.clone());
    }
    if let Some(output) = params.opt_str("output") {
        let curve = hooke.curve(r)?;
        let mut entry = Info::new();
        entry.insert("path".into(), curve.path.display().to_string().into());
        entry.insert(block.name.clone(), Value::Map(values.clone()));
        let mut record = BTreeMap::new();
        record.insert(curve.name.clone(), Value::Map(entry));
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(output)?;
        file.write_all(serde_yaml::to_string(&record)?.as_bytes())?;
    }
    io.emit(values);
    Ok(())
}

fn delta(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = hooke.block(r, block_name(params, "block"))?;
    let points = params.usize_list("point")?;
    let (a, b) = (block.row(points[0])?, block.row(points[1])?);
    let si = params.bool("SI")?;
    let mut out = Vec::with_capacity(a.len());
    for (label, (a, b)) in block.columns().iter().zip(a.iter().zip(&b)) {
        let d = a - b;
        let entry = if si {
            let (name, unit) = split_label(label)?;
            vec![Value::from(name), Value::from(pp_si(d, &unit, Some(2)))]
        } else {
            vec![Value::from(label.as_str()), Value::from(d)]
        };
        out.push(Value::List(entry));
    }
    io.emit(Value::List(out));
    Ok(())
}

fn export_block(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = hooke.block(r, block_name(params, "block"))?;
    write_block(Path::new(params.str("output")?), block, params.bool("header")?)?;
    Ok(())
}

fn difference(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let curve = hooke.curve(r)?;
    let block_a = curve.block(block_name(params, "block A"))?.name.clone();
    let block_b = match block_name(params, "block B") {
        Some(name) => curve.block(Some(name))?.name.clone(),
        None => block_a.clone(),
    };
    let (label_a, label_b) = (params.str("column A")?, params.str("column B")?);
    let (name_a, unit_a) = split_label(label_a)?;
    let (name_b, unit_b) = split_label(label_b)?;
    if unit_a != unit_b {
        return Err(Failure::message(format!(
            "cannot subtract '{label_b}' from '{label_a}': units differ"
        )));
    }
    let a = column(hooke, r, Some(&block_a), label_a)?;
    let b = column(hooke, r, Some(&block_b), label_b)?;
    if a.len() != b.len() {
        return Err(Failure::message(format!(
            "column lengths differ ({} vs {})",
            a.len(),
            b.len()
        )));
    }
    let output = params.opt_str("output column").map(str::to_string).unwrap_or_else(|| {
        join_data_label(
            &format!("difference of {block_a} {name_a} and {block_b} {name_b}"),
            &unit_a,
        )
    });
    let values = a.iter().zip(&b).map(|(a, b)| a - b).collect();
    set_column(hooke, r, Some(&block_a), &output, values)?;
    hooke.add_to_command_stack(r, "difference", params)
}

fn parse_weights(value: &Value) -> CommandResult<BTreeMap<i64, Real>> {
    let map = value
        .as_map()
        .ok_or_else(|| Failure::invalid("weights", "expected a dict"))?;
    map.iter()
        .map(|(k, w)| {
            let offset = k
                .trim()
                .parse::<i64>()
                .map_err(|_| Failure::invalid("weights", format!("offset '{k}' is not an integer")))?;
            let weight = w
                .as_f64()
                .ok_or_else(|| Failure::invalid("weights", format!("weight for {k} is not a number")))?;
            Ok((offset, weight))
        })
        .collect()
}

fn derivative(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = block_name(params, "block");
    let (x_label, f_label) = (params.str("x column")?, params.str("f column")?);
    let (x_name, x_unit) = split_label(x_label)?;
    let (f_name, f_unit) = split_label(f_label)?;
    let weights = parse_weights(params.get("weights"))?;
    let x = column(hooke, r, block, x_label)?;
    let f = column(hooke, r, block, f_label)?;
    let df = weighted_derivative(&x, &f, &weights)?;
    let output = params.opt_str("output column").map(str::to_string).unwrap_or_else(|| {
        join_data_label(
            &format!("derivative of {f_name} with respect to {x_name}"),
            &format!("{f_unit}/{x_unit}"),
        )
    });
    set_column(hooke, r, block, &output, df)?;
    hooke.add_to_command_stack(r, "derivative", params)
}

/// `value * info[path]`, with a missing half counting as one and both
/// missing as zero.
fn scaled_constant(params: &Params, info: &Info, name: &str) -> CommandResult<Real> {
    let value = params.opt_f64(name);
    let looked_up = match params.opt_str(&format!("{name} name")) {
        Some(path) => Some(
            lookup_nested(info, path, '|')
                .and_then(Value::as_f64)
                .ok_or_else(|| Failure::message(format!("no numeric block info '{path}' for {name}")))?,
        ),
        None => None,
    };
    Ok(match (value, looked_up) {
        (None, None) => 0.0,
        (a, b) => a.unwrap_or(1.0) * b.unwrap_or(1.0),
    })
}

fn scaled_column_addition(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, true)?;
    let block = block_name(params, "block");
    let data = hooke.block(r, block)?;
    let n = data.nrows();
    let input = |arg: &str| -> CommandResult<Vec<Real>> {
        match params.opt_str(arg) {
            Some(label) => Ok(data.column(label)?),
            None => Ok(vec![0.0; n]),
        }
    };
    let (i1, i2) = (input("input column 1")?, input("input column 2")?);
    let a = scaled_constant(params, &data.info, "scale 1")?;
    let b = scaled_constant(params, &data.info, "scale 2")?;
    let c = scaled_constant(params, &data.info, "constant")?;
    let out = i1.iter().zip(&i2).map(|(x, y)| a * x + b * y + c).collect();
    let output = params.str("output column")?.to_string();
    set_column(hooke, r, block, &output, out)?;
    hooke.add_to_command_stack(r, "scaled column addition", params)
}

fn clear_command_stack(hooke: &mut Hooke, params: &Params, io: &mut CommandIo<'_>) -> CommandResult<()> {
    let r = hooke.resolve_curve(params, io, false)?;
    hooke.curve_mut(r)?.command_stack.clear();
    Ok(())
}
