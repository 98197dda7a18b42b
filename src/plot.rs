//! Log-log line chart of mean duration against test size.
//!
//! One series per measurement name. The highlighted series is drawn thick and
//! black; the others take evenly spaced hues around the color wheel.

use std::path::{Path, PathBuf};
use std::process::Command;

use plotters::prelude::*;
use tracing::{info, warn};

use crate::aggregate::Aggregated;
use crate::error::{HarnessError, Result};

/// Conventional reference series.
pub const DEFAULT_HIGHLIGHT: &str = "std::vector";

const HIGHLIGHT_WIDTH: u32 = 5;
const SERIES_WIDTH: u32 = 2;

#[derive(Clone, Debug)]
pub struct PlotConfig {
    pub output: PathBuf,
    pub highlight: String,
    pub title: String,
    pub size: (u32, u32),
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("performance.svg"),
            highlight: DEFAULT_HIGHLIGHT.to_string(),
            title: "push_back duration vs. item count".to_string(),
            size: (1280, 800),
        }
    }
}

/// A measurement's plottable points and line style.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesSpec {
    pub name: String,
    pub points: Vec<(f64, f64)>,
    pub color: RGBColor,
    pub stroke_width: u32,
}

/// Build one series per measurement name, in name order.
///
/// Points with a non-positive size or mean cannot be placed on a log axis and
/// are dropped with a warning.
pub fn build_series(aggregated: &Aggregated, highlight: &str) -> Vec<SeriesSpec> {
    let others = aggregated.names.iter().filter(|n| *n != highlight).count();
    let mut hue_index = 0usize;

    aggregated
        .names
        .iter()
        .map(|name| {
            let (color, stroke_width) = if name == highlight {
                (RGBColor(0, 0, 0), HIGHLIGHT_WIDTH)
            } else {
                let color = spectrum(hue_index, others);
                hue_index += 1;
                (color, SERIES_WIDTH)
            };

            let mut points = Vec::new();
            for (size, mean) in aggregated.series(name) {
                if size == 0 || !(mean.is_finite() && mean > 0.0) {
                    warn!(
                        series = %name,
                        size,
                        mean,
                        "point not representable on log axes, skipped"
                    );
                    continue;
                }
                points.push((size as f64, mean));
            }

            SeriesSpec {
                name: name.clone(),
                points,
                color,
                stroke_width,
            }
        })
        .collect()
}

/// The `index`-th of `count` colors spread evenly over the hue wheel.
pub fn spectrum(index: usize, count: usize) -> RGBColor {
    let hue = index as f64 / count.max(1) as f64;
    let (r, g, b) = HSLColor(hue, 0.85, 0.45).rgb();
    RGBColor(r, g, b)
}

/// Padded log-safe range covering every value.
fn log_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return None;
    }
    if lo == hi {
        return Some((lo / 2.0, hi * 2.0));
    }
    Some((lo / 1.25, hi * 1.25))
}

/// Render the chart to `cfg.output` as SVG.
pub fn render(aggregated: &Aggregated, cfg: &PlotConfig) -> Result<()> {
    let series = build_series(aggregated, &cfg.highlight);
    if !aggregated.names.iter().any(|n| *n == cfg.highlight) {
        warn!(highlight = %cfg.highlight, "highlighted series not present in results");
    }

    let x = log_range(series.iter().flat_map(|s| s.points.iter().map(|p| p.0)));
    let y = log_range(series.iter().flat_map(|s| s.points.iter().map(|p| p.1)));
    let (Some(x), Some(y)) = (x, y) else {
        return Err(HarnessError::Plot("no plottable points".to_string()));
    };

    draw(&cfg.output, cfg, &series, x, y).map_err(|e| HarnessError::Plot(e.to_string()))?;
    info!(path = %cfg.output.display(), series = series.len(), "plot written");
    Ok(())
}

fn draw(
    path: &Path,
    cfg: &PlotConfig,
    series: &[SeriesSpec],
    (x_lo, x_hi): (f64, f64),
    (y_lo, y_hi): (f64, f64),
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(path, cfg.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&cfg.title, ("sans-serif", 24))
        .margin(16)
        .x_label_area_size(48)
        .y_label_area_size(80)
        .build_cartesian_2d((x_lo..x_hi).log_scale(), (y_lo..y_hi).log_scale())?;

    chart
        .configure_mesh()
        .x_desc("test size")
        .y_desc("mean duration (s)")
        .x_label_formatter(&|v| format!("{v:.0e}"))
        .y_label_formatter(&|v| format!("{v:.0e}"))
        .draw()?;

    for spec in series {
        let style = ShapeStyle::from(&spec.color).stroke_width(spec.stroke_width);
        chart
            .draw_series(LineSeries::new(spec.points.iter().copied(), style))?
            .label(spec.name.as_str())
            .legend(move |(lx, ly)| PathElement::new(vec![(lx, ly), (lx + 24, ly)], style));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Where to render: the explicit path if given, otherwise a kept temporary
/// file when the plot is only going to a viewer, otherwise
/// `performance.svg` in the working directory.
pub fn resolve_output(explicit: Option<&Path>, open: bool) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if !open {
        return Ok(PlotConfig::default().output);
    }
    let path = tempfile::Builder::new()
        .prefix("perf-sweep-")
        .suffix(".svg")
        .tempfile()?
        .into_temp_path()
        .keep()
        .map_err(|e| HarnessError::Io(e.error))?;
    Ok(path)
}

/// Hand the rendered file to the platform's default viewer.
pub fn open_in_viewer(path: &Path) -> Result<()> {
    let mut cmd = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };
    let program = PathBuf::from(cmd.get_program());
    let status = cmd
        .arg(path)
        .status()
        .map_err(|source| HarnessError::Spawn { program, source })?;
    if !status.success() {
        warn!(path = %path.display(), code = ?status.code(), "viewer exited unsuccessfully");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::tempdir;

    fn sample(names: &[&str]) -> Aggregated {
        let mut agg = Aggregator::new();
        for size in [1u64, 10, 100, 1000] {
            let m: BTreeMap<String, f64> = names
                .iter()
                .enumerate()
                .map(|(i, n)| (n.to_string(), size as f64 * 1e-6 * (i + 1) as f64))
                .collect();
            agg.record(size, &m).unwrap();
        }
        agg.finish()
    }

    #[test]
    fn test_one_series_per_name() {
        let agg = sample(&[
            "std::vector",
            "mmapped (malloc)",
            "mmapped (mmap)",
            "mmapped (file)",
        ]);
        let series = build_series(&agg, DEFAULT_HIGHLIGHT);

        assert_eq!(series.len(), agg.names.len());
        let names: Vec<&str> = series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, agg.names);
        assert!(series.iter().all(|s| s.points.len() == 4));
    }

    #[test]
    fn test_highlight_style() {
        let agg = sample(&["std::vector", "a", "b"]);
        let series = build_series(&agg, DEFAULT_HIGHLIGHT);

        let hl: Vec<&SeriesSpec> = series
            .iter()
            .filter(|s| s.stroke_width == HIGHLIGHT_WIDTH)
            .collect();
        assert_eq!(hl.len(), 1);
        assert_eq!(hl[0].name, "std::vector");
        assert_eq!(hl[0].color, RGBColor(0, 0, 0));
    }

    #[test]
    fn test_other_series_get_distinct_colors() {
        let agg = sample(&["std::vector", "a", "b", "c", "d"]);
        let series = build_series(&agg, DEFAULT_HIGHLIGHT);

        let colors: Vec<RGBColor> = series
            .iter()
            .filter(|s| s.name != DEFAULT_HIGHLIGHT)
            .map(|s| s.color)
            .collect();
        assert_eq!(colors.len(), 4);
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_non_positive_points_dropped() {
        let mut agg = Aggregator::new();
        agg.record(1, &BTreeMap::from([("a".to_string(), 0.0)])).unwrap();
        agg.record(10, &BTreeMap::from([("a".to_string(), 1.0)])).unwrap();

        let series = build_series(&agg.finish(), "none");
        assert_eq!(series[0].points, vec![(10.0, 1.0)]);
    }

    #[test]
    fn test_log_range_padding() {
        assert_eq!(log_range([4.0].into_iter()), Some((2.0, 8.0)));
        assert_eq!(log_range(std::iter::empty()), None);
        let (lo, hi) = log_range([1.0, 100.0].into_iter()).unwrap();
        assert!(lo < 1.0 && hi > 100.0);
    }

    #[test]
    fn test_render_writes_svg_with_legend() {
        let dir = tempdir().unwrap();
        let cfg = PlotConfig {
            output: dir.path().join("plot.svg"),
            ..Default::default()
        };
        let agg = sample(&["std::vector", "mmapped_vector (MmapAllocator)"]);

        render(&agg, &cfg).unwrap();

        let svg = fs::read_to_string(&cfg.output).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("mmapped_vector (MmapAllocator)"));
        assert!(svg.contains("std::vector"));
    }

    #[test]
    fn test_resolve_output() {
        let explicit = Path::new("out/chart.svg");
        assert_eq!(resolve_output(Some(explicit), true).unwrap(), explicit);
        assert_eq!(resolve_output(Some(explicit), false).unwrap(), explicit);
        assert_eq!(
            resolve_output(None, false).unwrap(),
            PathBuf::from("performance.svg")
        );

        let temp = resolve_output(None, true).unwrap();
        assert!(temp.exists());
        assert_eq!(temp.extension().and_then(|e| e.to_str()), Some("svg"));
        assert!(temp.starts_with(std::env::temp_dir()));
        fs::remove_file(&temp).unwrap();
    }

    #[test]
    fn test_render_empty_fails() {
        let dir = tempdir().unwrap();
        let cfg = PlotConfig {
            output: dir.path().join("plot.svg"),
            ..Default::default()
        };

        let err = render(&Aggregated::default(), &cfg).unwrap_err();
        assert!(matches!(err, HarnessError::Plot(_)));
        assert!(!cfg.output.exists());
    }
}
