// 该文件是 Cheshang （车伤） 项目的一部分。
// src/model/label.rs - 车损类别标签表
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

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

pub trait WithLabel: Sized + fmt::Debug {
  fn to_label_str(&self) -> &'static str;
  fn to_label_id(&self) -> u32;
  fn from_label_id(id: u32) -> Result<Self, LabelMappingError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("class index {index} is out of range for a label table of {len} entries")]
pub struct LabelMappingError {
  pub index: u32,
  pub len: usize,
}

/// 模型输出的类别，顺序与训练时的类别表一致
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DamageLabel {
  BodypanelDent,
  FrontWindscreenDamage,
  HeadlightDamage,
  RearWindscreenDamage,
  RunningBoardDent,
  SidemirrorDamage,
  SignlightDamage,
  TaillightDamage,
  BonnetDent,
  BootDent,
  DoorouterDent,
  FenderDent,
  FrontBumperDent,
  PillarDent,
  QuaterpanelDent,
  RearBumperDent,
  RoofDent,
}

pub const DAMAGE_LABEL_COUNT: usize = 17;

impl DamageLabel {
  pub const ALL: [DamageLabel; DAMAGE_LABEL_COUNT] = [
    DamageLabel::BodypanelDent,
    DamageLabel::FrontWindscreenDamage,
    DamageLabel::HeadlightDamage,
    DamageLabel::RearWindscreenDamage,
    DamageLabel::RunningBoardDent,
    DamageLabel::SidemirrorDamage,
    DamageLabel::SignlightDamage,
    DamageLabel::TaillightDamage,
    DamageLabel::BonnetDent,
    DamageLabel::BootDent,
    DamageLabel::DoorouterDent,
    DamageLabel::FenderDent,
    DamageLabel::FrontBumperDent,
    DamageLabel::PillarDent,
    DamageLabel::QuaterpanelDent,
    DamageLabel::RearBumperDent,
    DamageLabel::RoofDent,
  ];
}

impl WithLabel for DamageLabel {
  // 标签字符串保持训练数据集中的原始写法（含大小写和拼写）
  fn to_label_str(&self) -> &'static str {
    match self {
      DamageLabel::BodypanelDent => "Bodypanel-Dent",
      DamageLabel::FrontWindscreenDamage => "Front-Windscreen-Damage",
      DamageLabel::HeadlightDamage => "Headlight-Damage",
      DamageLabel::RearWindscreenDamage => "Rear-windscreen-Damage",
      DamageLabel::RunningBoardDent => "RunningBoard-Dent",
      DamageLabel::SidemirrorDamage => "Sidemirror-Damage",
      DamageLabel::SignlightDamage => "Signlight-Damage",
      DamageLabel::TaillightDamage => "Taillight-Damage",
      DamageLabel::BonnetDent => "bonnet-dent",
      DamageLabel::BootDent => "boot-dent",
      DamageLabel::DoorouterDent => "doorouter-dent",
      DamageLabel::FenderDent => "fender-dent",
      DamageLabel::FrontBumperDent => "front-bumper-dent",
      DamageLabel::PillarDent => "pillar-dent",
      DamageLabel::QuaterpanelDent => "quaterpanel-dent",
      DamageLabel::RearBumperDent => "rear-bumper-dent",
      DamageLabel::RoofDent => "roof-dent",
    }
  }

  fn to_label_id(&self) -> u32 {
    *self as u32
  }

  fn from_label_id(id: u32) -> Result<Self, LabelMappingError> {
    DamageLabel::ALL
      .get(id as usize)
      .copied()
      .ok_or(LabelMappingError {
        index: id,
        len: DAMAGE_LABEL_COUNT,
      })
  }
}

impl TryFrom<u32> for DamageLabel {
  type Error = LabelMappingError;

  fn try_from(id: u32) -> Result<Self, Self::Error> {
    DamageLabel::from_label_id(id)
  }
}

impl fmt::Display for DamageLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.to_label_str())
  }
}

impl Serialize for DamageLabel {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(self.to_label_str())
  }
}
