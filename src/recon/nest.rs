//! Stepwise ("nested") reconstruction.
//!
//! Proxy availability shrinks going back in time, so the network is split
//! into nests: each nest uses only the records complete from its start year
//! through the end of the instrumental overlap, and is calibrated on its own.
//! Every year of the final series comes from the latest-starting nest that
//! covers it, i.e. the one with the richest proxy set.

use nalgebra::DMatrix;

use super::pca::ComponentSelection;
use super::{NestFit, cps, pcr, stats, verify};
use crate::data::model::{
    NestSummary, ProxyNetwork, ReconMethod, Reconstruction, TemperatureSeries,
};
use crate::error::{ReconError, ReconResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ReconSettings {
    pub method: ReconMethod,
    /// Inclusive calibration window.
    pub calibration: (i32, i32),
    /// Optional inclusive window withheld from calibration for verification.
    pub validation: Option<(i32, i32)>,
    pub components: ComponentSelection,
    /// Spacing of nest start years.
    pub nest_step: i32,
    /// Half-width of the uncertainty band in residual standard errors.
    pub uncertainty_sigmas: f64,
}

impl Default for ReconSettings {
    fn default() -> Self {
        Self {
            method: ReconMethod::Pcr,
            calibration: (1896, 1995),
            validation: Some((1850, 1895)),
            components: ComponentSelection::Fixed(3),
            nest_step: 100,
            uncertainty_sigmas: 2.0,
        }
    }
}

impl ReconSettings {
    /// First and last year of calibration ∪ validation.
    pub fn overlap(&self) -> (i32, i32) {
        match self.validation {
            Some((vs, ve)) => (self.calibration.0.min(vs), self.calibration.1.max(ve)),
            None => self.calibration,
        }
    }
}

/// One calibrated nest, predictions cover `start..=overlap end`.
struct Nest {
    start: i32,
    predictions: Vec<f64>,
    summary: NestSummary,
}

pub fn reconstruct(
    network: &ProxyNetwork,
    target: &TemperatureSeries,
    settings: &ReconSettings,
) -> ReconResult<Reconstruction> {
    if network.is_empty() {
        return Err(ReconError::EmptyNetwork);
    }
    let net_span = network.span().ok_or(ReconError::EmptyNetwork)?;
    let target_span = target
        .span()
        .ok_or(ReconError::InsufficientCalibration { needed: 3, got: 0 })?;

    let (cal_start, cal_end) = settings.calibration;
    let (ov_start, ov_end) = settings.overlap();
    if cal_start > cal_end {
        return Err(out_of_range("calibration", settings.calibration, settings.calibration));
    }
    if let Some(v) = settings.validation {
        if v.0 > v.1 {
            return Err(out_of_range("validation", v, v));
        }
    }
    within((ov_start, ov_end), net_span, "proxy network")?;
    within((ov_start, ov_end), target_span, "target")?;

    let calibration = target.window(cal_start, cal_end);
    if calibration.len() < 3 {
        return Err(ReconError::InsufficientCalibration {
            needed: 3,
            got: calibration.len(),
        });
    }
    let validation = settings
        .validation
        .map(|(s, e)| target.window(s, e))
        .filter(|v| v.len() >= 2);

    let step = settings.nest_step.max(1);
    let first = net_span.0.div_euclid(step) * step;
    // The last nest starts at the overlap start so every usable record is fit.
    let mut starts: Vec<i32> = (first..ov_start)
        .step_by(step as usize)
        .map(|s| s.max(net_span.0))
        .collect();
    starts.push(ov_start);
    starts.dedup();

    let usable: Vec<usize> = (0..network.len())
        .filter(|&i| network.complete_over(i, ov_start, ov_end))
        .filter(|&i| varies_over(network, i, &calibration))
        .collect();
    log::info!(
        "{} of {} records are complete over {ov_start}..={ov_end}",
        usable.len(),
        network.len()
    );

    let mut nests: Vec<Nest> = Vec::new();
    let mut previous: Option<Vec<usize>> = None;
    for start in starts {
        let members: Vec<usize> = usable
            .iter()
            .copied()
            .filter(|&i| network.complete_over(i, start, ov_end))
            .collect();
        if members.is_empty() {
            log::debug!("Nest {start}: no complete records, skipped");
            continue;
        }
        if previous.as_ref() == Some(&members) {
            continue;
        }
        let nest = fit_nest(
            network,
            &members,
            (start, ov_end),
            &calibration,
            validation.as_deref(),
            settings,
        )?;
        log::info!(
            "Nest {start}: {} proxies, {} components, r²={:.3}, σ={:.3}",
            nest.summary.n_proxies,
            nest.summary.n_components,
            nest.summary.calibration_r2,
            nest.summary.sigma
        );
        nests.push(nest);
        previous = Some(members);
    }

    let first_start = nests.first().ok_or(ReconError::NoUsableNest)?.start;
    Ok(splice(settings, nests, first_start, ov_end))
}

fn fit_nest(
    network: &ProxyNetwork,
    members: &[usize],
    (start, end): (i32, i32),
    calibration: &[(i32, f64)],
    validation: Option<&[(i32, f64)]>,
    settings: &ReconSettings,
) -> ReconResult<Nest> {
    let n_rows = (end - start + 1) as usize;
    let offset = network
        .year_index(start)
        .ok_or_else(|| out_of_range("nest", (start, end), network.span().unwrap_or((0, 0))))?;
    let proxies = DMatrix::from_fn(n_rows, members.len(), |i, j| {
        network.records[members[j]].values[offset + i]
    });

    let row_of = |year: i32| -> ReconResult<usize> {
        usize::try_from(year - start)
            .ok()
            .filter(|&row| row < n_rows)
            .ok_or_else(|| out_of_range("nest", (year, year), (start, end)))
    };
    let cal_rows = calibration
        .iter()
        .map(|&(y, _)| row_of(y))
        .collect::<ReconResult<Vec<usize>>>()?;
    let cal_target: Vec<f64> = calibration.iter().map(|&(_, t)| t).collect();

    let NestFit {
        predictions,
        n_components,
    } = match settings.method {
        ReconMethod::Cps => cps::fit(&proxies, &cal_rows, &cal_target)?,
        ReconMethod::Pcr => pcr::fit(&proxies, &cal_rows, &cal_target, settings.components)?,
    };

    let cal_pred: Vec<f64> = cal_rows.iter().map(|&r| predictions[r]).collect();
    let calibration_r2 = verify::calibration_r2(&cal_pred, &cal_target);
    let dof = cal_target.len().saturating_sub(n_components + 1).max(1);
    let sse = stats::sum_sq_diff(&cal_pred, &cal_target).unwrap_or(f64::NAN);
    let mut sigma = (sse / dof as f64).sqrt();

    let (mut validation_re, mut validation_ce) = (None, None);
    if let Some(val) = validation {
        let val_pred = val
            .iter()
            .map(|&(y, _)| row_of(y).map(|r| predictions[r]))
            .collect::<ReconResult<Vec<f64>>>()?;
        let val_obs: Vec<f64> = val.iter().map(|&(_, t)| t).collect();
        validation_re = Some(verify::reduction_of_error(
            &val_pred,
            &val_obs,
            stats::mean(&cal_target),
        ));
        validation_ce = Some(verify::coefficient_of_efficiency(&val_pred, &val_obs));
        sigma = stats::rmse(&val_pred, &val_obs);
    }

    Ok(Nest {
        start,
        predictions,
        summary: NestSummary {
            start,
            n_proxies: members.len(),
            n_components,
            calibration_r2,
            validation_re,
            validation_ce,
            sigma,
        },
    })
}

/// Take each year from the latest-starting nest covering it.
fn splice(settings: &ReconSettings, nests: Vec<Nest>, first: i32, end: i32) -> Reconstruction {
    let years: Vec<i32> = (first..=end).collect();
    let mut values = Vec::with_capacity(years.len());
    let mut lower = Vec::with_capacity(years.len());
    let mut upper = Vec::with_capacity(years.len());
    let mut nest_of = Vec::with_capacity(years.len());

    for &year in &years {
        // nests are sorted by start, so the last covering one is the richest
        let nest = nests
            .iter()
            .rev()
            .find(|n| n.start <= year)
            .unwrap_or(&nests[0]);
        let value = nest.predictions[(year - nest.start) as usize];
        let half_width = settings.uncertainty_sigmas * nest.summary.sigma;
        values.push(value);
        lower.push(value - half_width);
        upper.push(value + half_width);
        nest_of.push(nest.start);
    }

    Reconstruction {
        method: settings.method,
        years,
        values,
        lower,
        upper,
        nest_of,
        nests: nests.into_iter().map(|n| n.summary).collect(),
    }
}

/// Whether record `idx` has non-zero variance over the calibration years.
fn varies_over(network: &ProxyNetwork, idx: usize, calibration: &[(i32, f64)]) -> bool {
    let values: Vec<f64> = calibration
        .iter()
        .filter_map(|&(y, _)| network.records[idx].values.get(network.year_index(y)?).copied())
        .collect();
    let sd = stats::std_dev(&values);
    if sd > 0.0 {
        true
    } else {
        log::warn!(
            "Record '{}' is constant over the calibration window, excluded",
            network.records[idx].name
        );
        false
    }
}

fn within(window: (i32, i32), span: (i32, i32), what: &'static str) -> ReconResult<()> {
    if window.0 < span.0 || window.1 > span.1 {
        return Err(out_of_range(what, window, span));
    }
    Ok(())
}

fn out_of_range(what: &'static str, window: (i32, i32), span: (i32, i32)) -> ReconError {
    ReconError::WindowOutOfRange {
        what,
        start: window.0,
        end: window.1,
        span_start: span.0,
        span_end: span.1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::ProxySeries;
    use crate::data::synthetic::{self, SyntheticConfig};
    use approx::assert_abs_diff_eq;

    fn synthetic_inputs() -> (ProxyNetwork, TemperatureSeries, TemperatureSeries) {
        let syn = synthetic::generate(&SyntheticConfig::default());
        (
            ProxyNetwork::from_series(syn.series),
            syn.instrumental,
            syn.truth,
        )
    }

    #[test]
    fn nests_grow_toward_the_present() {
        let (net, target, _) = synthetic_inputs();
        let recon = reconstruct(&net, &target, &ReconSettings::default()).unwrap();

        assert_eq!(recon.years.first(), Some(&1000));
        assert_eq!(recon.years.last(), Some(&1995));
        let starts: Vec<i32> = recon.nests.iter().map(|n| n.start).collect();
        assert_eq!(starts, vec![1000, 1300, 1500, 1800]);
        let sizes: Vec<usize> = recon.nests.iter().map(|n| n.n_proxies).collect();
        assert_eq!(sizes, vec![6, 12, 18, 24]);
        assert_eq!(recon.nest_of[0], 1000);
        assert_eq!(recon.nest_of[recon.len() - 1], 1800);
    }

    #[test]
    fn pcr_tracks_the_true_temperature() {
        let (net, target, truth) = synthetic_inputs();
        let recon = reconstruct(&net, &target, &ReconSettings::default()).unwrap();
        let check = verify::compare_to_reference(&recon.as_series(), &truth, f64::INFINITY);
        assert!(check.correlation > 0.6, "correlation {}", check.correlation);
        for n in &recon.nests {
            assert!(n.validation_re.unwrap() > 0.0, "nest {} RE {:?}", n.start, n.validation_re);
        }
    }

    #[test]
    fn cps_tracks_the_true_temperature() {
        let (net, target, truth) = synthetic_inputs();
        let settings = ReconSettings {
            method: ReconMethod::Cps,
            ..ReconSettings::default()
        };
        let recon = reconstruct(&net, &target, &settings).unwrap();
        assert_eq!(recon.method, ReconMethod::Cps);
        assert!(recon.nests.iter().all(|n| n.n_components == 1));
        let check = verify::compare_to_reference(&recon.as_series(), &truth, f64::INFINITY);
        assert!(check.correlation > 0.6, "correlation {}", check.correlation);
    }

    #[test]
    fn band_is_symmetric_and_scaled_by_sigma() {
        let (net, target, _) = synthetic_inputs();
        let settings = ReconSettings {
            validation: None,
            uncertainty_sigmas: 1.0,
            ..ReconSettings::default()
        };
        let recon = reconstruct(&net, &target, &settings).unwrap();
        let last = recon.len() - 1;
        let sigma = recon.nests.last().unwrap().sigma;
        assert_abs_diff_eq!(recon.upper[last] - recon.values[last], sigma, epsilon = 1e-12);
        assert_abs_diff_eq!(recon.values[last] - recon.lower[last], sigma, epsilon = 1e-12);
        assert!(recon.nests.iter().all(|n| n.validation_re.is_none()));
    }

    #[test]
    fn reconstruction_is_deterministic() {
        let (net, target, _) = synthetic_inputs();
        let a = reconstruct(&net, &target, &ReconSettings::default()).unwrap();
        let b = reconstruct(&net, &target, &ReconSettings::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn windows_outside_the_data_are_rejected() {
        let (net, target, _) = synthetic_inputs();
        let settings = ReconSettings {
            calibration: (1900, 2050),
            ..ReconSettings::default()
        };
        let err = reconstruct(&net, &target, &settings).unwrap_err();
        assert!(matches!(err, ReconError::WindowOutOfRange { what: "proxy network", .. }));
    }

    #[test]
    fn empty_network_is_rejected() {
        let target = TemperatureSeries::new([(1900, 0.0)]);
        let err = reconstruct(&ProxyNetwork::default(), &target, &ReconSettings::default());
        assert_eq!(err.unwrap_err(), ReconError::EmptyNetwork);
    }

    /// Records spanning `first..=1995` that follow a shared signal.
    fn staggered_network(firsts: &[i32]) -> (ProxyNetwork, TemperatureSeries) {
        let signal = |y: i32| (f64::from(y) * 0.21).sin() + 0.3 * (f64::from(y) * 0.05).cos();
        let series = firsts
            .iter()
            .enumerate()
            .map(|(i, &first)| {
                let time: Vec<f64> = (first..=1995).map(f64::from).collect();
                let value = (first..=1995)
                    .map(|y| signal(y) + 0.1 * (f64::from(y) * (0.7 + i as f64)).sin())
                    .collect();
                ProxySeries {
                    name: format!("p{first}"),
                    time,
                    value,
                    ..Default::default()
                }
            })
            .collect();
        let target = TemperatureSeries::new((1850..=1995).map(|y| (y, signal(y))));
        (ProxyNetwork::from_series(series), target)
    }

    #[test]
    fn validation_before_calibration_inside_a_nest_step() {
        let (net, target) = staggered_network(&[1700, 1830]);
        let settings = ReconSettings {
            method: ReconMethod::Cps,
            calibration: (1900, 1995),
            validation: Some((1850, 1899)),
            nest_step: 100,
            ..ReconSettings::default()
        };
        let recon = reconstruct(&net, &target, &settings).unwrap();
        let nests: Vec<(i32, usize)> = recon.nests.iter().map(|n| (n.start, n.n_proxies)).collect();
        assert_eq!(nests, vec![(1700, 1), (1850, 2)]);
        assert!(recon.nests.iter().all(|n| n.validation_re.is_some()));
        assert_eq!(recon.years.first(), Some(&1700));
        assert_eq!(recon.nest_of[recon.len() - 1], 1850);
    }

    #[test]
    fn default_step_of_thirty_years_does_not_split_validation() {
        let (net, target, _) = synthetic_inputs();
        let settings = ReconSettings {
            nest_step: 30,
            ..ReconSettings::default()
        };
        let recon = reconstruct(&net, &target, &settings).unwrap();
        assert_eq!(recon.years.last(), Some(&1995));
        assert!(recon.nests.iter().all(|n| n.start <= 1850));
    }

    #[test]
    fn last_nest_uses_every_record_complete_over_the_overlap() {
        let (net, target) = staggered_network(&[1700, 1820, 1840]);
        let recon = reconstruct(&net, &target, &ReconSettings::default()).unwrap();
        let last = recon.nests.last().unwrap();
        assert_eq!(last.start, 1850);
        assert_eq!(last.n_proxies, net.len());
        assert_eq!(recon.nests[0].start, 1700);
        assert_eq!(recon.nests[0].n_proxies, 1);
    }

    #[test]
    fn records_with_gaps_in_the_overlap_are_left_out() {
        let years: Vec<f64> = (1900..=1960).map(f64::from).collect();
        let signal: Vec<f64> = (0..years.len()).map(|i| (i as f64 * 0.3).sin()).collect();
        let mut gappy: Vec<f64> = signal.iter().map(|s| s + 0.1).collect();
        gappy[50] = f64::NAN;
        let net = ProxyNetwork::from_series(vec![
            ProxySeries {
                name: "clean".into(),
                time: years.clone(),
                value: signal.clone(),
                ..Default::default()
            },
            ProxySeries {
                name: "gappy".into(),
                time: years.clone(),
                value: gappy,
                ..Default::default()
            },
        ]);
        let target = TemperatureSeries::new((1900..=1960).zip(signal.iter().copied()));
        let settings = ReconSettings {
            method: ReconMethod::Cps,
            calibration: (1930, 1960),
            validation: None,
            nest_step: 50,
            ..ReconSettings::default()
        };
        let recon = reconstruct(&net, &target, &settings).unwrap();
        assert_eq!(recon.nests.len(), 1);
        assert_eq!(recon.nests[0].n_proxies, 1);
        assert_eq!(recon.years.first(), Some(&1900));
        assert_abs_diff_eq!(recon.values[0], signal[0], epsilon = 1e-9);
    }
}
