//! Chart of per-city daily averages.
//!
//! Reads the store only; the output format follows the file extension
//! (`.svg` for SVG, anything else for a PNG bitmap).

use anyhow::{Result, anyhow, bail};
use chrono::{Duration, NaiveDate};
use plotters::{
    coord::Shift, drawing::DrawingAreaErrorKind, prelude::*, series::DashedLineSeries,
};
use std::{ops::Range, path::Path};

use crate::{model::SeriesPoint, store::ReadingStore};

const CHART_SIZE: (u32, u32) = (1280, 720);

#[derive(Debug, Clone, PartialEq)]
pub struct CitySeries {
    pub city: String,
    pub points: Vec<SeriesPoint>,
}

pub fn collect_series<S>(store: &S, cities: &[String]) -> Result<Vec<CitySeries>>
where
    S: ReadingStore + ?Sized,
{
    cities
        .iter()
        .map(|city| -> Result<CitySeries> {
            Ok(CitySeries {
                city: city.clone(),
                points: store.query_series(city)?,
            })
        })
        .collect()
}

/// Date and value ranges covering every point, or `None` when there is nothing to draw.
pub fn chart_bounds(series: &[CitySeries]) -> Option<(Range<NaiveDate>, Range<f64>)> {
    let points = series.iter().flat_map(|s| s.points.iter());

    let mut first: Option<NaiveDate> = None;
    let mut last: Option<NaiveDate> = None;
    let mut low = f64::INFINITY;
    let mut high = f64::NEG_INFINITY;

    for p in points {
        first = Some(first.map_or(p.date, |d| d.min(p.date)));
        last = Some(last.map_or(p.date, |d| d.max(p.date)));

        for v in std::iter::once(p.avg_temp_c).chain(p.avg_humidity_pct) {
            low = low.min(v);
            high = high.max(v);
        }
    }

    let (first, mut last) = (first?, last?);
    if first == last {
        last = first + Duration::days(1);
    }

    let pad = if high > low { (high - low) * 0.05 } else { 1.0 };

    Some((first..last, (low - pad)..(high + pad)))
}

pub fn render_chart<S>(store: &S, cities: &[String], output: &Path) -> Result<()>
where
    S: ReadingStore + ?Sized,
{
    let series = collect_series(store, cities)?;

    // Checked before a backend exists so nothing is written for an empty store.
    let Some(bounds) = chart_bounds(&series) else {
        bail!("No data to plot; run the monitor first to collect readings");
    };

    let is_svg = output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"));

    if is_svg {
        draw(SVGBackend::new(output, CHART_SIZE).into_drawing_area(), &series, bounds)?;
    } else {
        draw(BitMapBackend::new(output, CHART_SIZE).into_drawing_area(), &series, bounds)?;
    }

    tracing::info!(path = %output.display(), cities = series.len(), "chart written");
    Ok(())
}

fn draw<DB: DrawingBackend>(
    root: DrawingArea<DB, Shift>,
    series: &[CitySeries],
    (dates, values): (Range<NaiveDate>, Range<f64>),
) -> Result<()> {
    let plot_err = |e: DrawingAreaErrorKind<DB::ErrorType>| anyhow!("Failed to draw chart: {e}");

    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            "Average Daily Temperature and Humidity for Cities",
            ("sans-serif", 28).into_font(),
        )
        .margin(10)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(dates, values)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Temperature (°C) / Humidity (%)")
        .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m-%d").to_string())
        .draw()
        .map_err(plot_err)?;

    for (idx, city) in series.iter().enumerate() {
        let temp_color = Palette99::pick(idx).to_rgba();
        let humidity_color = temp_color.mix(0.5);

        chart
            .draw_series(LineSeries::new(
                city.points.iter().map(|p| (p.date, p.avg_temp_c)),
                temp_color.stroke_width(2),
            ))
            .map_err(plot_err)?
            .label(format!("{} Temp", city.city))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], temp_color));

        chart
            .draw_series(DashedLineSeries::new(
                city.points
                    .iter()
                    .filter_map(|p| p.avg_humidity_pct.map(|h| (p.date, h))),
                6,
                4,
                humidity_color.stroke_width(2),
            ))
            .map_err(plot_err)?
            .label(format!("{} Humidity", city.city))
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], humidity_color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}
