//! Criterion benchmarks for quakefit-misfit: single evaluation with and without time shifts.

use criterion::{Criterion, criterion_group, criterion_main};

use quakefit_misfit::{
    GreensComponent, GreensTensor, GreensTensorList, Misfit, MomentTensor, Source, SourceKind,
};
use quakefit_waveform::{Dataset, Origin, Trace, TraceHeader, WaveformRecord};

const N_STATIONS: usize = 20;
const N_DATA: usize = 256;
const N_PAD: usize = 32;

fn basis_trace(station: usize, component: usize, basis: usize) -> Vec<f64> {
    let f = 0.03 + 0.002 * (station + component + basis) as f64;
    (0..N_DATA + 2 * N_PAD)
        .map(|i| (i as f64 * f).sin() * (-(i as f64 - 160.0).powi(2) / 2000.0).exp())
        .collect()
}

fn make_problem() -> (Dataset, GreensTensorList) {
    let origin = Origin::new(0.0, 0.0, 0.0, 10_000.0);
    let mut tensors = Vec::new();
    let mut data = Dataset::new();
    for s in 0..N_STATIONS {
        let name = format!("S{s:02}");
        let components: Vec<GreensComponent> = ["BHZ", "BHR", "BHT"]
            .iter()
            .enumerate()
            .map(|(c, ch)| {
                GreensComponent::new(
                    TraceHeader::new("XX", &name, ch, 0.1),
                    (0..6).map(|b| basis_trace(s, c, b)).collect(),
                )
                .unwrap()
            })
            .collect();
        tensors.push(GreensTensor::new(SourceKind::MomentTensor, origin.clone(), components).unwrap());

        let traces: Vec<Trace> = ["BHZ", "BHR", "BHT"]
            .iter()
            .enumerate()
            .map(|(c, ch)| {
                let samples = basis_trace(s, c, 0)[N_PAD..N_PAD + N_DATA].to_vec();
                Trace::new(TraceHeader::new("XX", &name, ch, 0.1), samples).unwrap()
            })
            .collect();
        data.append(WaveformRecord::new(traces).unwrap().with_origin(origin.clone()))
            .unwrap();
    }
    (data, GreensTensorList::new(tensors))
}

fn bench_evaluate(c: &mut Criterion) {
    let (data, greens) = make_problem();
    let source = Source::from(MomentTensor::from_strike_dip_rake(30.0, 60.0, 45.0, 4.0));

    let fixed = Misfit::new();
    let prepared = fixed.prepare(&data, &greens).unwrap();
    c.bench_function("misfit_20sta_3cmp_256_no_shift", |b| {
        b.iter(|| prepared.evaluate(&source).unwrap());
    });

    let shifted = Misfit::new()
        .with_time_shift_max(2.0)
        .with_time_shift_groups(&["ZR", "T"]);
    let prepared = shifted.prepare(&data, &greens).unwrap();
    c.bench_function("misfit_20sta_3cmp_256_shift_2s", |b| {
        b.iter(|| prepared.evaluate(&source).unwrap());
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
