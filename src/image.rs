use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::errors::{EmberError, Result, ResultExt};

/// 镜像元数据，<images>/<name>/metadata.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageMetadata {
    pub name: String,
    pub layers: Vec<String>,
}

/// 解析镜像的层目录，按层序（目录名升序）返回
///
/// 层目录无法枚举或为空都视为镜像不存在。
pub fn resolve_layers(images_root: &Path, image: &str) -> Result<Vec<PathBuf>> {
    let layers_root = images_root.join(image).join("layers");
    let entries = fs::read_dir(&layers_root)
        .map_err(|_| EmberError::ImageNotFound(image.to_string()))?;
    let mut lowers: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    lowers.sort();
    if lowers.is_empty() {
        return Err(EmberError::ImageNotFound(image.to_string()));
    }
    debug!("镜像 {} 共 {} 层", image, lowers.len());
    Ok(lowers)
}

/// Emberfile 的一行指令
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub keyword: String,
    pub arg: String,
}

/// 解析简化镜像描述文件：空行与 # 注释跳过，每行一条指令
pub fn parse_imagefile(content: &str) -> Vec<Directive> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| match l.split_once(char::is_whitespace) {
            Some((kw, rest)) => Directive {
                keyword: kw.to_string(),
                arg: rest.trim().to_string(),
            },
            None => Directive {
                keyword: l.to_string(),
                arg: String::new(),
            },
        })
        .collect()
}

/// 从 Emberfile 构建单层镜像
///
/// 仅支持 FROM scratch 加若干 ADD src dest，产物是 layers/00 一个
/// 层目录加 metadata.json。
pub fn build(imagefile: &Path, tag: &str, data_root: &Path) -> Result<()> {
    let content = fs::read_to_string(imagefile)
        .chain_err(|| format!("读取 {} 失败", imagefile.display()))?;
    let directives = parse_imagefile(&content);

    match directives.first() {
        Some(d) if d.keyword == "FROM" => {
            if d.arg != "scratch" {
                crate::bail!("仅支持 FROM scratch，收到: FROM {}", d.arg);
            }
        }
        _ => crate::bail!("第一条指令必须是 FROM"),
    }

    let images_root = crate::paths::images_root(data_root);
    let layer_root = images_root.join(tag).join("layers").join("00");
    fs::create_dir_all(&layer_root)?;

    for d in &directives {
        if d.keyword == "ADD" {
            let parts: Vec<&str> = d.arg.split_whitespace().collect();
            if parts.len() != 2 {
                crate::bail!("ADD 需要两个参数: ADD src dest");
            }
            let (src, dest) = (parts[0], parts[1]);
            // dest 可能以 / 开头，去掉后拼进层目录
            let target = layer_root.join(dest.trim_start_matches('/'));
            copy_path(Path::new(src), &target, data_root)?;
            debug!("ADD {} -> {}", src, target.display());
        }
    }

    let meta = ImageMetadata {
        name: tag.to_string(),
        layers: vec!["00".to_string()],
    };
    write_metadata(&images_root, tag, &meta)?;
    info!("镜像 {} 构建完成", tag);
    Ok(())
}

/// docker save 清单里的一条镜像
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    #[serde(rename = "Layers")]
    layers: Vec<String>,
}

/// 导入 docker save 格式的 tar 包
///
/// 解包到临时目录，按 manifest.json 把每个层 tar 展开到
/// layers/<NN>/，最后写 metadata.json。
pub fn import_docker_save_tar(tar_path: &Path, name: &str, data_root: &Path) -> Result<()> {
    let temp = std::env::temp_dir().join(format!("ember-import-{}", std::process::id()));
    let _ = fs::remove_dir_all(&temp);
    fs::create_dir_all(&temp)?;

    let file = fs::File::open(tar_path)
        .chain_err(|| format!("打开 {} 失败", tar_path.display()))?;
    tar::Archive::new(file)
        .unpack(&temp)
        .chain_err(|| format!("解包 {} 失败", tar_path.display()))?;

    let manifest_bytes = fs::read(temp.join("manifest.json"))
        .map_err(|e| EmberError::Generic(format!("manifest.json 缺失: {}", e)))?;
    let manifest: Vec<ManifestEntry> = serde_json::from_slice(&manifest_bytes)?;
    let entry = manifest
        .first()
        .ok_or_else(|| EmberError::Generic("manifest 为空".to_string()))?;

    let images_root = crate::paths::images_root(data_root);
    let layers_root = images_root.join(name).join("layers");
    fs::create_dir_all(&layers_root)?;

    let mut layer_ids = Vec::new();
    for (i, layer_tar) in entry.layers.iter().enumerate() {
        let id = format!("{:02}", i);
        let dst = layers_root.join(&id);
        fs::create_dir_all(&dst)?;
        let f = fs::File::open(temp.join(layer_tar))?;
        tar::Archive::new(f)
            .unpack(&dst)
            .chain_err(|| format!("展开层 {} 失败", layer_tar))?;
        layer_ids.push(id);
    }

    let meta = ImageMetadata {
        name: name.to_string(),
        layers: layer_ids,
    };
    write_metadata(&images_root, name, &meta)?;
    let _ = fs::remove_dir_all(&temp);
    info!("镜像 {} 导入完成，共 {} 层", name, entry.layers.len());
    Ok(())
}

fn write_metadata(images_root: &Path, name: &str, meta: &ImageMetadata) -> Result<()> {
    let path = images_root.join(name).join("metadata.json");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(meta)?)?;
    Ok(())
}

/// 递归复制文件或目录；落在数据根目录下的内容跳过，避免构建时
/// 把自己的数据目录拷进镜像层
fn copy_path(src: &Path, dst: &Path, data_root: &Path) -> Result<()> {
    if under_data_root(src, data_root) {
        return Ok(());
    }
    let meta = fs::metadata(src)
        .map_err(|e| EmberError::Generic(format!("源路径 {} 不可用: {}", src.display(), e)))?;
    if meta.is_dir() {
        fs::create_dir_all(dst)?;
        for entry in fs::read_dir(src)?.flatten() {
            copy_path(&entry.path(), &dst.join(entry.file_name()), data_root)?;
        }
    } else {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, dst)?;
    }
    Ok(())
}

fn under_data_root(p: &Path, data_root: &Path) -> bool {
    match (p.canonicalize(), data_root.canonicalize()) {
        (Ok(p), Ok(root)) => p.starts_with(root),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_imagefile() {
        let content = "# 注释\n\nFROM scratch\nADD hello.txt /etc/motd\n";
        let d = parse_imagefile(content);
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].keyword, "FROM");
        assert_eq!(d[0].arg, "scratch");
        assert_eq!(d[1].keyword, "ADD");
        assert_eq!(d[1].arg, "hello.txt /etc/motd");
    }

    #[test]
    fn test_parse_imagefile_keyword_only() {
        let d = parse_imagefile("PS\n");
        assert_eq!(d[0].keyword, "PS");
        assert_eq!(d[0].arg, "");
    }

    #[test]
    fn test_build_requires_from_scratch() {
        let tmp = tempfile::tempdir().unwrap();
        let f = tmp.path().join("Emberfile");
        fs::write(&f, "FROM ubuntu\n").unwrap();
        assert!(build(&f, "x", tmp.path()).is_err());
        fs::write(&f, "ADD a b\n").unwrap();
        assert!(build(&f, "x", tmp.path()).is_err());
    }

    #[test]
    fn test_build_creates_layer_and_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let data_root = tmp.path().join("data");
        let src = tmp.path().join("hello.txt");
        fs::write(&src, "hi").unwrap();
        let f = tmp.path().join("Emberfile");
        fs::write(
            &f,
            format!("FROM scratch\nADD {} /etc/motd\n", src.display()),
        )
        .unwrap();

        build(&f, "demo", &data_root).unwrap();

        let img = crate::paths::images_root(&data_root).join("demo");
        assert_eq!(
            fs::read_to_string(img.join("layers/00/etc/motd")).unwrap(),
            "hi"
        );
        let meta: ImageMetadata =
            serde_json::from_slice(&fs::read(img.join("metadata.json")).unwrap()).unwrap();
        assert_eq!(meta.name, "demo");
        assert_eq!(meta.layers, vec!["00".to_string()]);
    }

    #[test]
    fn test_resolve_layers_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let layers = tmp.path().join("images/demo/layers");
        fs::create_dir_all(layers.join("01")).unwrap();
        fs::create_dir_all(layers.join("00")).unwrap();
        let lowers = resolve_layers(&tmp.path().join("images"), "demo").unwrap();
        assert_eq!(lowers.len(), 2);
        assert!(lowers[0].ends_with("00"));
        assert!(lowers[1].ends_with("01"));
    }

    #[test]
    fn test_resolve_layers_missing_image() {
        let tmp = tempfile::tempdir().unwrap();
        match resolve_layers(tmp.path(), "ghost") {
            Err(EmberError::ImageNotFound(name)) => assert_eq!(name, "ghost"),
            other => panic!("expected ImageNotFound, got {:?}", other),
        }
    }

    fn tar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut b = tar::Builder::new(Vec::new());
        for (path, data) in entries {
            let mut h = tar::Header::new_gnu();
            h.set_size(data.len() as u64);
            h.set_mode(0o644);
            h.set_cksum();
            b.append_data(&mut h, path, *data).unwrap();
        }
        b.into_inner().unwrap()
    }

    #[test]
    fn test_import_docker_save_tar() {
        let tmp = tempfile::tempdir().unwrap();
        let data_root = tmp.path().join("data");

        let layer = tar_bytes(&[("etc/motd", b"hello".as_slice())]);
        let manifest = br#"[{"Config":"cfg.json","RepoTags":["demo:latest"],"Layers":["layer.tar"]}]"#;
        let bundle = tar_bytes(&[
            ("manifest.json", manifest.as_slice()),
            ("layer.tar", layer.as_slice()),
        ]);
        let tar_path = tmp.path().join("demo.tar");
        fs::write(&tar_path, bundle).unwrap();

        import_docker_save_tar(&tar_path, "demo", &data_root).unwrap();

        let img = crate::paths::images_root(&data_root).join("demo");
        assert_eq!(
            fs::read_to_string(img.join("layers/00/etc/motd")).unwrap(),
            "hello"
        );
        let meta: ImageMetadata =
            serde_json::from_slice(&fs::read(img.join("metadata.json")).unwrap()).unwrap();
        assert_eq!(meta.layers, vec!["00".to_string()]);
    }
}
