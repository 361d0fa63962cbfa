#[macro_use]
extern crate bencher;

use bencher::Bencher;
use digitnet::backend::CpuBackend;
use digitnet::net::layer::Layer;
use digitnet::tensor::{Dim2, Tensor, TensorBase};
use digitnet::util::bench::*;

macro_rules! impl_bench {
    ($forward:ident, $backprop:ident, $ty:ty, $batch:expr) => {
        fn $forward(bench: &mut Bencher) {
            let backend = CpuBackend::<$ty>::new();
            let mut layer = get_conv_layer(&backend).unwrap();
            let (images, _) = get_image_batch::<$ty>($batch);
            let mut output = Tensor::zeroed(Dim2($batch, layer.output_size()));
            bench.iter(|| layer.forward(&backend, images.view(), &mut output))
        }

        fn $backprop(bench: &mut Bencher) {
            let backend = CpuBackend::<$ty>::new();
            let mut layer = get_conv_layer(&backend).unwrap();
            let (images, _) = get_image_batch::<$ty>($batch);
            let mut output = Tensor::zeroed(Dim2($batch, layer.output_size()));
            layer.forward(&backend, images.view(), &mut output);
            let output_error = Tensor::filled(0.01, Dim2($batch, layer.output_size()));
            let mut input_error = Tensor::zeroed(Dim2($batch, layer.input_size()));
            bench.iter(|| {
                layer.backprop(
                    &backend,
                    images.view(),
                    &output,
                    Some(&mut input_error),
                    &output_error,
                )
            })
        }
    };
}

impl_bench!(cpu_f32_forward_lg, cpu_f32_backprop_lg, f32, BATCH_LG);
impl_bench!(cpu_f32_forward_md, cpu_f32_backprop_md, f32, BATCH_MD);
impl_bench!(cpu_f32_forward_sm, cpu_f32_backprop_sm, f32, BATCH_SM);
benchmark_group!(
    cpu_f32,
    cpu_f32_forward_lg,
    cpu_f32_forward_md,
    cpu_f32_forward_sm,
    cpu_f32_backprop_lg,
    cpu_f32_backprop_md,
    cpu_f32_backprop_sm
);

impl_bench!(cpu_f64_forward_md, cpu_f64_backprop_md, f64, BATCH_MD);
benchmark_group!(cpu_f64, cpu_f64_forward_md, cpu_f64_backprop_md);

benchmark_main!(cpu_f32, cpu_f64);
