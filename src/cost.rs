//! Closed-form parameter and FLOP counts.
//!
//! A multiply-accumulate counts as two FLOPs; bias additions and the residual
//! addition count as one FLOP per output element.

/// Number of learnable parameters of a square-kernel convolution
pub fn conv_parameter_count(
    kernel: usize,
    in_channels: usize,
    out_channels: usize,
    bias: bool,
) -> usize {
    let weights = kernel * kernel * in_channels * out_channels;
    if bias {
        weights + out_channels
    } else {
        weights
    }
}

/// FLOPs of one convolution producing an `out_height` x `out_width` map per output channel
pub fn conv_flops(
    kernel: usize,
    in_channels: usize,
    out_channels: usize,
    out_height: usize,
    out_width: usize,
    bias: bool,
) -> usize {
    let outputs = out_channels * out_height * out_width;
    let macs = kernel * kernel * in_channels * outputs;
    2 * macs + if bias { outputs } else { 0 }
}

/// Basic residual block: two stride-1 same-padded convolutions and a shortcut.
///
/// The shortcut is the identity when the channel counts match, otherwise a 1x1
/// projection convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidualBlock {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: usize,
    pub height: usize,
    pub width: usize,
    pub bias: bool,
}

impl ResidualBlock {
    pub fn has_projection(&self) -> bool {
        self.in_channels != self.out_channels
    }

    pub fn parameter_count(&self) -> usize {
        let first =
            conv_parameter_count(self.kernel, self.in_channels, self.out_channels, self.bias);
        let second =
            conv_parameter_count(self.kernel, self.out_channels, self.out_channels, self.bias);
        let shortcut = if self.has_projection() {
            conv_parameter_count(1, self.in_channels, self.out_channels, self.bias)
        } else {
            0
        };
        first + second + shortcut
    }

    pub fn flops(&self) -> usize {
        let (h, w) = (self.height, self.width);
        let first = conv_flops(
            self.kernel,
            self.in_channels,
            self.out_channels,
            h,
            w,
            self.bias,
        );
        let second = conv_flops(
            self.kernel,
            self.out_channels,
            self.out_channels,
            h,
            w,
            self.bias,
        );
        let shortcut = if self.has_projection() {
            conv_flops(1, self.in_channels, self.out_channels, h, w, self.bias)
        } else {
            0
        };
        let addition = self.out_channels * h * w;
        first + second + shortcut + addition
    }
}
