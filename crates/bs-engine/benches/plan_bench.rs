use bs_core::{ByteSource, Fragment, ParamChange, Settings};
use bs_engine::{NullMidi, NullOscillator, ParamTimeline, PlaybackController};
use criterion::{criterion_group, criterion_main, Criterion};

fn source(len: usize) -> ByteSource {
    ByteSource::from((0..len).map(|i| (i * 31 % 256) as u8).collect::<Vec<_>>())
}

fn settings(len: usize) -> Settings {
    Settings {
        fragment: Fragment { from: 0, to: len - 1 },
        ..Settings::default()
    }
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("play first block", |b| {
        let mut ctl = PlaybackController::new(settings(10_000), NullOscillator, NullMidi);
        ctl.load(0.0, source(10_000));
        b.iter(|| {
            ctl.play(0.0);
            ctl.stop(0.0);
        })
    });

    c.bench_function("timing replan mid block", |b| {
        let mut ctl = PlaybackController::new(settings(10_000), NullOscillator, NullMidi);
        ctl.load(0.0, source(10_000));
        ctl.play(0.0);
        ctl.poll(1.0);
        let mut speed = 0.01;
        b.iter(|| {
            speed = if speed == 0.01 { 0.02 } else { 0.01 };
            ctl.apply(1.0, ParamChange::ReadingSpeed(std::hint::black_box(speed)));
        })
    });

    c.bench_function("plan and poll one second", |b| {
        b.iter(|| {
            let mut ctl = PlaybackController::new(settings(1000), ParamTimeline::default(), NullMidi);
            ctl.load(0.0, source(1000));
            ctl.play(0.0);
            ctl.poll(1.0);
            std::hint::black_box(ctl.oscillator().events().len())
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
