//! Built-in download library.
//!
//! A trimmed version of the full model library: the essential custom nodes
//! plus a spread of popular checkpoints, LoRAs, VAEs and upscalers. A larger
//! catalog can be supplied as JSON via `Catalog::load`.

use super::models::{Catalog, CatalogEntry, Category, RepoEntry};

fn entry(name: &str, url: &str, filename: Option<&str>, dest_dir: Option<&str>) -> CatalogEntry {
    CatalogEntry {
        name: name.into(),
        url: Some(url.into()),
        download_url: None,
        filename: filename.map(String::from),
        dest_dir: dest_dir.map(String::from),
        required: false,
        info: None,
    }
}

fn node(name: &str, url: &str, required: bool) -> RepoEntry {
    RepoEntry {
        name: name.into(),
        url: url.into(),
        required,
        info: None,
    }
}

impl Catalog {
    /// The catalog shipped with the launcher.
    pub fn builtin() -> Self {
        Self {
            categories: vec![
                Category {
                    id: "checkpoints".into(),
                    label: "Model Checkpoints".into(),
                    entries: vec![
                        entry(
                            "Pony_Diffusion_V6_XL.safetensors",
                            "https://civitai.com/api/download/models/290640?type=Model&format=SafeTensor&size=pruned&fp=fp16",
                            Some("Pony_Diffusion_V6_XL.safetensors"),
                            None,
                        ),
                        entry(
                            "SD1.5_DreamShaper.safetensors",
                            "https://civitai.com/api/download/models/128713",
                            Some("SD1.5_DreamShaper.safetensors"),
                            None,
                        ),
                        entry(
                            "SD1.5_Deliberate.safetensors",
                            "https://huggingface.co/XpucT/Deliberate/resolve/main/Deliberate_v6.safetensors?download=true",
                            Some("SD1.5_Deliberate.safetensors"),
                            None,
                        ),
                        entry(
                            "SDXL.safetensors",
                            "https://huggingface.co/stabilityai/stable-diffusion-xl-base-1.0/resolve/main/sd_xl_base_1.0.safetensors?download=true",
                            Some("SDXL.safetensors"),
                            None,
                        ),
                        entry(
                            "FLUX_Schnell.safetensors",
                            "https://huggingface.co/black-forest-labs/FLUX.1-schnell/resolve/main/flux1-schnell.safetensors?download=true",
                            Some("FLUX_Schnell.safetensors"),
                            None,
                        ),
                    ],
                },
                Category {
                    id: "loras".into(),
                    label: "LoRA Models".into(),
                    entries: vec![
                        entry(
                            "SDXL_Lightning_2step.safetensors",
                            "https://huggingface.co/ByteDance/SDXL-Lightning/resolve/main/sdxl_lightning_2step_lora.safetensors?download=true",
                            Some("SDXL_Lightning_2step.safetensors"),
                            None,
                        ),
                        entry(
                            "Hyper_SDXL_8step.safetensors",
                            "https://huggingface.co/ByteDance/Hyper-SD/resolve/main/Hyper-SDXL-8steps-CFG-lora.safetensors",
                            Some("Hyper_SDXL_8step.safetensors"),
                            None,
                        ),
                    ],
                },
                Category {
                    id: "embeddings".into(),
                    label: "Text Embeddings".into(),
                    entries: vec![entry(
                        "EasyNegative.pt",
                        "https://civitai.com/api/download/models/9208?type=Model&format=SafeTensor&size=full&fp=fp16",
                        Some("EasyNegative.pt"),
                        None,
                    )],
                },
                Category {
                    id: "vae".into(),
                    label: "VAE Models".into(),
                    entries: vec![entry(
                        "SDXL_VAE.safetensors",
                        "https://huggingface.co/stabilityai/sdxl-vae/resolve/main/sdxl_vae.safetensors",
                        Some("SDXL_VAE.safetensors"),
                        None,
                    )],
                },
                Category {
                    id: "upscale_models".into(),
                    label: "Upscale Models".into(),
                    entries: vec![
                        entry(
                            "RealESRGAN_x4plus.pth",
                            "https://github.com/xinntao/Real-ESRGAN/releases/download/v0.1.0/RealESRGAN_x4plus.pth",
                            Some("RealESRGAN_x4plus.pth"),
                            Some("models/upscale_models"),
                        ),
                        entry(
                            "4x_foolhardy_Remacri.pth",
                            "https://huggingface.co/FacehugmanIII/4x_foolhardy_Remacri/resolve/main/4x_foolhardy_Remacri.pth?download=true",
                            Some("4x_foolhardy_Remacri.pth"),
                            Some("models/upscale_models"),
                        ),
                    ],
                },
                Category {
                    id: "additional".into(),
                    label: "Additional Downloads".into(),
                    entries: vec![entry(
                        "Flux_Redux.safetensors",
                        "https://civitai.com/api/download/models/1086258",
                        Some("Flux_Redux.safetensors"),
                        Some("models/style_models"),
                    )],
                },
            ],
            custom_nodes: vec![
                node(
                    "ComfyUI-Manager",
                    "https://github.com/ltdrdata/ComfyUI-Manager.git",
                    true,
                ),
                node(
                    "rgthree-comfy",
                    "https://github.com/rgthree/rgthree-comfy.git",
                    false,
                ),
                node(
                    "ComfyUI-Impact-Pack",
                    "https://github.com/ltdrdata/ComfyUI-Impact-Pack.git",
                    false,
                ),
                node(
                    "ComfyUI-Easy-Use",
                    "https://github.com/yolain/ComfyUI-Easy-Use.git",
                    false,
                ),
                node(
                    "ComfyUI-Custom-Scripts",
                    "https://github.com/pythongosssss/ComfyUI-Custom-Scripts.git",
                    false,
                ),
                node(
                    "was-node-suite-comfyui",
                    "https://github.com/ltdrdata/was-node-suite-comfyui.git",
                    false,
                ),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_entries_are_well_formed() {
        let catalog = Catalog::builtin();
        assert!(!catalog.categories.is_empty());
        for category in &catalog.categories {
            for entry in &category.entries {
                assert!(entry.resolved_url().is_some(), "{} has no URL", entry.name);
            }
        }
        // Exactly one essential node is forced on.
        let required: Vec<_> = catalog.custom_nodes.iter().filter(|n| n.required).collect();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].name, "ComfyUI-Manager");
    }

    #[test]
    fn builtin_catalog_round_trips_through_json() {
        let catalog = Catalog::builtin();
        let json = serde_json::to_string(&catalog).unwrap();
        let restored: Catalog = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.categories.len(), catalog.categories.len());
        assert_eq!(restored.custom_nodes.len(), catalog.custom_nodes.len());
    }
}
