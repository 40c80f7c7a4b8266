use std::fmt;

use serde::{Deserialize, Serialize};

/// 待核验的一条交付记录
///
/// 由数据源抓取接口产生，创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// 学校编号
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub npsn: String,
    /// 交付单号（详情查询使用）
    #[serde(rename = "no_bapp", default, deserialize_with = "deserialize_lenient_string")]
    pub order_id: String,
    /// 供应商序列号
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub serial_number: String,
    /// 数据源表单编号
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub action_id: String,
    /// BAPP 编号（提交时使用）
    #[serde(rename = "bapp", default, deserialize_with = "deserialize_lenient_string")]
    pub bapp_number: String,
    /// 设备类别
    #[serde(rename = "type", default, deserialize_with = "deserialize_lenient_string")]
    pub kind: String,
    /// 处理状态
    #[serde(default, deserialize_with = "deserialize_lenient_string")]
    pub status: String,
    /// 供应商序列号核对结果（原样回传给数据源）
    #[serde(rename = "cek_sn_penyedia", default, deserialize_with = "deserialize_lenient_string")]
    pub serial_check: String,
}

impl Task {
    /// 预取缓存使用的键
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.npsn, &self.order_id)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[任务 {} 单号#{}]", self.npsn, self.order_id)
    }
}

/// 详情缓存键：`{npsn}_{order_id}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(npsn: &str, order_id: &str) -> Self {
        Self(format!("{}_{}", npsn, order_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 数字或字符串都按字符串读取，null 视为空串
pub(crate) fn deserialize_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Visitor;

    struct LenientVisitor;

    impl<'de> Visitor<'de> for LenientVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string, a number or null")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(String::new())
        }

        fn visit_none<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(LenientVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_reads_wire_names_and_numeric_npsn() {
        let raw = serde_json::json!({
            "npsn": 20212345,
            "no_bapp": "ORD-1",
            "serial_number": "SN-9",
            "action_id": 77,
            "bapp": "BAPP/1",
            "type": "Zyrex",
            "status": "PROSES",
            "cek_sn_penyedia": null
        });
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.npsn, "20212345");
        assert_eq!(task.order_id, "ORD-1");
        assert_eq!(task.action_id, "77");
        assert_eq!(task.kind, "Zyrex");
        assert_eq!(task.serial_check, "");
        assert_eq!(task.cache_key().as_str(), "20212345_ORD-1");
    }

    #[test]
    fn test_null_or_missing_fields_do_not_reject_row() {
        let rows = serde_json::json!([
            { "type": null, "status": null, "npsn": "1" },
            { "type": "Zyrex", "status": "PROSES" }
        ]);
        let tasks: Vec<Task> = serde_json::from_value(rows).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].kind, "");
        assert_eq!(tasks[0].status, "");
        assert_eq!(tasks[1].npsn, "");
    }
}
