// 该文件是 Cheshang （车伤） 项目的一部分。
// src/frame.rs - NCHW 输入张量定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use image::RgbImage;

const RGB_CHANNELS: usize = 3;

/// 填充区域使用的灰度值
pub const LETTERBOX_FILL: u8 = 114;

/// 归一化到 [0, 1] 的 RGB 浮点帧，按 NCHW 排布（batch 固定为 1）
#[derive(Debug, Clone)]
pub struct RgbNchwFrame {
  data: Box<[f32]>,
  height: usize,
  width: usize,
}

impl RgbNchwFrame {
  pub fn with_shape(height: usize, width: usize) -> Self {
    let fill = LETTERBOX_FILL as f32 / 255.0;
    let data = vec![fill; RGB_CHANNELS * height * width].into_boxed_slice();
    Self {
      data,
      height,
      width,
    }
  }

  /// 把图像放入 `size x size` 画布的左上角，其余部分用灰色填充。
  ///
  /// 图像不做缩放，因此模型输出的坐标即为原图像素坐标。
  /// 超出画布的部分会被裁掉。
  pub fn letterbox(image: &RgbImage, size: usize) -> Self {
    let mut frame = Self::with_shape(size, size);

    let plane = frame.height * frame.width;
    let width = frame.width;
    let copy_w = (image.width() as usize).min(frame.width);
    let copy_h = (image.height() as usize).min(frame.height);
    let slice = frame.as_mut();

    for h in 0..copy_h {
      for w in 0..copy_w {
        let pixel = image.get_pixel(w as u32, h as u32);
        let idx = h * width + w;
        for c in 0..RGB_CHANNELS {
          slice[c * plane + idx] = pixel[c] as f32 / 255.0;
        }
      }
    }
    frame
  }

  /// `[1, 3, H, W]`
  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.height, self.width]
  }

  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  pub fn into_data(self) -> Box<[f32]> {
    self.data
  }
}

impl AsMut<[f32]> for RgbNchwFrame {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}
