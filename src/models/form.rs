use std::fmt;

use serde::{Deserialize, Serialize};

/// 评估表单的 11 个固定字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldId {
    /// 地理标记
    G,
    /// 学校照片 / 名牌
    H,
    /// 箱子与负责人照片
    I,
    /// 设备完整性照片
    J,
    /// DxDiag
    K,
    /// BAPP 上的条码序列号
    O,
    /// BAPP 第 1 页
    Q,
    /// BAPP 第 2 页
    R,
    /// BAPP 签名
    S,
    /// 印章
    T,
    /// BAPP 日期
    F,
}

impl FieldId {
    /// 数据源表单中的字段顺序
    pub const ALL: [FieldId; 11] = [
        FieldId::H,
        FieldId::I,
        FieldId::J,
        FieldId::K,
        FieldId::O,
        FieldId::Q,
        FieldId::R,
        FieldId::S,
        FieldId::T,
        FieldId::G,
        FieldId::F,
    ];

    /// 显示名称
    pub fn label(self) -> &'static str {
        match self {
            FieldId::H => "FOTO SEKOLAH/PAPAN NAMA",
            FieldId::I => "FOTO BOX & PIC",
            FieldId::J => "FOTO KELENGKAPAN UNIT",
            FieldId::K => "DXDIAG",
            FieldId::O => "BARCODE SN BAPP",
            FieldId::Q => "BAPP HAL 1",
            FieldId::R => "BAPP HAL 2",
            FieldId::S => "TTD BAPP",
            FieldId::T => "STEMPEL",
            FieldId::G => "GEO TAGGING",
            FieldId::F => "TGL BAPP",
        }
    }

    /// 数据源表单中 `<select name=…>` 的名字，也是提交字段名
    pub fn form_name(self) -> &'static str {
        match self {
            FieldId::H => "f_papan_identitas",
            FieldId::I => "f_box_pic",
            FieldId::J => "f_unit",
            FieldId::K => "spesifikasi_dxdiag",
            FieldId::O => "bc_bapp_sn",
            FieldId::Q => "bapp_hal1",
            FieldId::R => "bapp_hal2",
            FieldId::S => "nm_ttd_bapp",
            FieldId::T => "stempel",
            FieldId::G => "geo_tag",
            FieldId::F => "ket_tgl_bapp",
        }
    }

    /// 选项尚未加载时使用的默认值
    pub fn canonical_default(self) -> &'static str {
        match self {
            FieldId::O => "Ada",
            FieldId::Q | FieldId::R => "Lengkap",
            FieldId::S => "Konsisten",
            _ => "Sesuai",
        }
    }

    /// 从单字母编号解析
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "G" => Some(FieldId::G),
            "H" => Some(FieldId::H),
            "I" => Some(FieldId::I),
            "J" => Some(FieldId::J),
            "K" => Some(FieldId::K),
            "O" => Some(FieldId::O),
            "Q" => Some(FieldId::Q),
            "R" => Some(FieldId::R),
            "S" => Some(FieldId::S),
            "T" => Some(FieldId::T),
            "F" => Some(FieldId::F),
            _ => None,
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// 表单中某字段的可选值
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationField {
    pub id: FieldId,
    pub options: Vec<String>,
}

impl EvaluationField {
    /// 第一个选项即默认值
    pub fn default_option(&self) -> Option<&str> {
        self.options.first().map(String::as_str)
    }
}

/// 从数据源表单定义解析出的全部字段选项
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormOptions {
    pub fields: Vec<EvaluationField>,
    /// 提交时需要回传的核验人员编号
    pub id_user: String,
}

impl FormOptions {
    pub fn is_loaded(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn field(&self, id: FieldId) -> Option<&EvaluationField> {
        self.fields.iter().find(|f| f.id == id)
    }
}
