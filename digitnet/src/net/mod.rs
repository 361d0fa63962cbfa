use crate::backend::Backend;
use crate::dtype::DType;
use crate::error::Error;
use crate::loss::LossFn;
use crate::net::initializer::{NetInitializer, VarianceScalingInitializer};
use crate::net::layer::{ConcreteLayer, ConcreteLayerParams, Layer, LayerParams};
use crate::optimizer::Optimizer;
use crate::tensor::{Dim1, Dim2, Dim3, Dim4, Dims, ITensor, Tensor, Tensor1, Tensor2, TensorBase, TensorView2, TensorView4};
use std::fmt::{Debug, Formatter};

pub mod initializer;
pub mod layer;

pub struct Net<B: Backend> {
    backend: B,
    input_shape: Dim3,
    topology: Box<[ConcreteLayerParams]>,
    layers: Box<[ConcreteLayer<B>]>,
    outputs: Box<[Tensor2<B::Float>]>,

    // training only, input_errors[i] is the error w.r.t. the input of layer i
    input_errors: Box<[Tensor2<B::Float>]>,
    loss_buff: Tensor1<B::Float>,
    loss_deriv_buff: Tensor2<B::Float>,
}

impl<B: Backend> Net<B> {
    fn new(backend: B, input_shape: Dim3, topology: Vec<ConcreteLayerParams>, layers: Vec<ConcreteLayer<B>>) -> Self {
        let outputs = layers
            .iter()
            .map(|l| Tensor::zeroed(Dim2(0, l.output_size())))
            .collect();
        let input_errors = layers
            .iter()
            .map(|l| Tensor::zeroed(Dim2(0, l.input_size())))
            .collect();
        let output_size = layers.last().map_or(0, |l| l.output_size());
        Net {
            backend,
            input_shape,
            topology: topology.into_boxed_slice(),
            layers: layers.into_boxed_slice(),
            outputs,
            input_errors,
            loss_buff: Tensor::zeroed(Dim1(0)),
            loss_deriv_buff: Tensor::zeroed(Dim2(0, output_size)),
        }
    }

    /// Runs inference on rows of flattened examples.
    pub fn predict(&mut self, input: TensorView2<B::Float>) -> &Tensor2<B::Float> {
        let num_rows = input.dims().rows();
        assert_eq!(
            input.dims(),
            &Dim2(num_rows, self.input_size()),
            "Invalid dimensions for input tensor"
        );
        self.forward(input);
        self.output()
    }

    /// Runs inference on an NHWC image batch, rejecting images of the wrong shape.
    pub fn predict_images(&mut self, images: TensorView4<B::Float>) -> Result<&Tensor2<B::Float>, Error> {
        let rows = self.check_image_dims(images.dims())?;
        let input = images.reshape(Dim2(rows, self.input_size()));
        Ok(self.predict(input))
    }

    pub(crate) fn check_image_dims(&self, dims: &Dim4) -> Result<usize, Error> {
        let &Dim4(rows, height, width, channels) = dims;
        if Dim3(height, width, channels) != self.input_shape {
            let Dim3(h, w, c) = self.input_shape;
            return Err(Error::ShapeMismatch {
                expected: format!("(N, {h}, {w}, {c})"),
                actual: dims.to_string(),
            });
        }
        Ok(rows)
    }

    /// One forward and backward pass followed by a single optimizer step.
    pub fn train_batch(
        &mut self,
        input: TensorView2<B::Float>,
        expected: TensorView2<B::Float>,
        loss: &LossFn,
        optimizer: &mut dyn Optimizer<B::Float>,
    ) -> TrainBatchResult<'_, B> {
        let num_rows = input.dims().rows();
        assert_eq!(
            input.dims(),
            &Dim2(num_rows, self.input_size()),
            "Invalid dimensions for input tensor"
        );
        assert_eq!(
            expected.dims(),
            &Dim2(num_rows, self.output_size()),
            "Invalid dimensions for expected tensor"
        );

        self.forward(input);
        self.backprop(input, expected, loss);

        optimizer.begin_step();
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.update_params(i, optimizer);
        }

        TrainBatchResult {
            output: self.output(),
            error: &self.loss_buff,
        }
    }

    fn forward(&mut self, input: TensorView2<B::Float>) {
        let num_rows = input.dims().rows();
        for (i, layer) in self.layers.iter_mut().enumerate() {
            let (prev, rest) = self.outputs.split_at_mut(i);
            let output = &mut rest[0];
            output.resize_major(B::Float::ZERO, num_rows);
            let layer_input = match prev.last() {
                None => input,
                Some(prev_output) => prev_output.view(),
            };
            layer.forward(&self.backend, layer_input, output);
        }
    }

    fn backprop(&mut self, input: TensorView2<B::Float>, expected: TensorView2<B::Float>, loss: &LossFn) {
        let num_rows = input.dims().rows();
        self.loss_buff.resize(B::Float::ZERO, Dim1(num_rows));
        self.loss_deriv_buff.resize_major(B::Float::ZERO, num_rows);
        let last = self.layers.len() - 1;
        loss.compute(
            &self.backend,
            &self.outputs[last],
            expected,
            &mut self.loss_buff,
            &mut self.loss_deriv_buff,
        );

        for (i, layer) in self.layers.iter_mut().enumerate().rev() {
            let (errors, later_errors) = self.input_errors.split_at_mut(i + 1);
            let output_error = if i == last { &self.loss_deriv_buff } else { &later_errors[0] };
            let layer_input = if i == 0 { input } else { self.outputs[i - 1].view() };
            // nothing consumes the error of the network input
            let input_error = if i == 0 {
                None
            } else {
                let input_error = &mut errors[i];
                input_error.resize_major(B::Float::ZERO, num_rows);
                Some(input_error)
            };
            layer.backprop(&self.backend, layer_input, &self.outputs[i], input_error, output_error);
        }
    }

    #[inline]
    fn output(&self) -> &Tensor2<B::Float> {
        &self.outputs[self.outputs.len() - 1]
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn input_shape(&self) -> Dim3 {
        self.input_shape
    }

    #[inline]
    pub fn input_size(&self) -> usize {
        self.input_shape.tensor_len()
    }

    #[inline]
    pub fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].output_size()
    }

    /// the layer parameters the network was built from
    #[inline]
    pub fn topology(&self) -> &[ConcreteLayerParams] {
        &self.topology
    }

    #[inline]
    pub fn layers(&self) -> &[ConcreteLayer<B>] {
        &self.layers
    }

    #[inline]
    pub fn layers_mut(&mut self) -> &mut [ConcreteLayer<B>] {
        &mut self.layers
    }

    /// Drops the batch-sized buffers kept from the last forward/backward pass.
    pub fn release_buffers(&mut self) {
        for tensor in self.outputs.iter_mut().chain(self.input_errors.iter_mut()) {
            *tensor = Tensor::zeroed(tensor.dims().with_resized_first_axis(0));
        }
        self.loss_buff = Tensor::zeroed(Dim1(0));
        self.loss_deriv_buff = Tensor::zeroed(self.loss_deriv_buff.dims().with_resized_first_axis(0));
    }
}

pub struct NetBuilder<B: Backend> {
    backend: B,
    input_shape: Dim3,
    initializer: Box<dyn NetInitializer<B::Float>>,
    layers: Vec<ConcreteLayerParams>,
}

impl<B: Backend> NetBuilder<B> {
    pub fn new(backend: B, input_shape: Dim3) -> Self {
        NetBuilder {
            backend,
            input_shape,
            initializer: Box::new(VarianceScalingInitializer::default()),
            layers: Vec::new(),
        }
    }

    pub fn with_initializer<I>(mut self, initializer: I) -> Self
    where
        I: 'static + NetInitializer<B::Float>,
    {
        self.initializer = Box::new(initializer);
        self
    }

    pub fn with_layer<T>(mut self, layer: T) -> Self
    where
        T: Into<ConcreteLayerParams>,
    {
        self.layers.push(layer.into());
        self
    }

    pub fn with_layers<I>(mut self, layers: I) -> Self
    where
        I: IntoIterator<Item = ConcreteLayerParams>,
    {
        self.layers.extend(layers);
        self
    }

    pub fn build(mut self) -> Result<Net<B>, Error> {
        if self.layers.is_empty() {
            return Err(Error::InvalidTopology("a network needs at least one layer".into()));
        }
        if self.input_shape.tensor_len() == 0 {
            return Err(Error::InvalidTopology(format!("empty input shape {}", self.input_shape)));
        }
        let mut layers = Vec::with_capacity(self.layers.len());
        let mut shape = self.input_shape;
        for (layer_idx, params) in self.layers.iter().enumerate() {
            let layer = params.create_layer(&self.backend, layer_idx, shape, self.initializer.as_mut())?;
            shape = layer.output_shape();
            layers.push(layer);
        }
        Ok(Net::new(self.backend, self.input_shape, self.layers, layers))
    }
}

pub struct TrainBatchResult<'a, B: Backend> {
    pub output: &'a Tensor2<B::Float>,
    /// per-example loss
    pub error: &'a Tensor1<B::Float>,
}

impl<B: Backend> TrainBatchResult<'_, B> {
    pub fn mean_loss(&self) -> f64 {
        let sum: f64 = self.error.iter().map(|e| e.as_f64()).sum();
        sum / self.error.len().max(1) as f64
    }
}

impl<B: Backend> Debug for Net<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Net")
            .field("backend", &self.backend)
            .field("input_shape", &self.input_shape)
            .field("layers", &self.layers)
            .finish_non_exhaustive()
    }
}
