use criterion::{black_box, criterion_group, criterion_main, Criterion};
use upright_latch::{
    dispatch, AnchorTable, Backend, Extractor, ImageView, KeyPoint, LatchConfig, Threading,
};

use rand_xoshiro::rand_core::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
    let (data, width, height) = match std::env::var("INPUT_FILE") {
        Ok(input_image_file) => {
            let luma = image::open(&input_image_file)
                .expect(&format!("could not load image at {:?}", input_image_file))
                .to_luma8();
            let (w, h) = luma.dimensions();
            (luma.into_raw(), w, h)
        }
        Err(_) => {
            let mut data = vec![0u8; 1280 * 720];
            rng.fill_bytes(&mut data);
            (data, 1280, 720)
        }
    };
    let image = ImageView::new(&data, width, height, width).expect("valid image");

    let keypoints: Vec<KeyPoint> = (0..5000)
        .map(|_| {
            KeyPoint::new(
                (rng.next_u32() % width) as f32,
                (rng.next_u32() % height) as f32,
            )
        })
        .collect();
    let table = AnchorTable::upright();

    for backend in [Backend::Scalar, Backend::Sse41, Backend::Avx2] {
        if !dispatch::is_supported(backend) {
            continue;
        }
        for threading in [Threading::Single, Threading::Auto] {
            let extractor =
                Extractor::new(&LatchConfig { threading, backend }).expect("extractor");
            c.bench_function(&format!("{backend}_{threading}"), |b| {
                b.iter(|| {
                    let descriptors = extractor.compute(&image, table, &keypoints);
                    black_box(descriptors).expect("descriptors");
                })
            });
        }
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
