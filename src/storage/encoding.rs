//! 二进制字段的 JSON 编码
//!
//! 顶点、索引按 `bytemuck` 字节视图做 base64，纹理字节直接 base64。

/// `Vec<u8>` 的 base64 字符串表示
pub mod base64_bytes {
    use base64::Engine;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(text)
            .map_err(D::Error::custom)
    }
}

/// `Vec<T: Pod>` 按字节视图的 base64 表示
pub mod pod_vec {
    use base64::Engine;
    use bytemuck::Pod;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S, T>(values: &Vec<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Pod,
    {
        let bytes: &[u8] = bytemuck::cast_slice(values.as_slice());
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Pod,
    {
        let text = String::deserialize(deserializer)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(text)
            .map_err(D::Error::custom)?;

        let size = std::mem::size_of::<T>();
        if size == 0 || bytes.len() % size != 0 {
            return Err(D::Error::custom(format!(
                "{} bytes is not a whole number of {}-byte elements",
                bytes.len(),
                size
            )));
        }
        // 解码出的缓冲区不保证对齐
        Ok(bytes
            .chunks_exact(size)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use crate::geometry::Vertex;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(with = "super::pod_vec")]
        vertices: Vec<Vertex>,
        #[serde(with = "super::base64_bytes")]
        raw: Vec<u8>,
    }

    #[test]
    fn test_vertices_survive_json() {
        let sample = Sample {
            vertices: vec![Vertex::new(
                [1.0, -2.0, 3.5],
                [0.0, 1.0, 0.0],
                [0.25, 0.75],
                [1.0, 0.0, 0.0],
            )],
            raw: vec![0, 255, 7],
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(serde_json::from_str::<Sample>(&json).unwrap(), sample);
    }

    #[test]
    fn test_rejects_partial_element() {
        let json = r#"{"vertices":"AAAA","raw":""}"#;
        assert!(serde_json::from_str::<Sample>(json).is_err());
    }
}
