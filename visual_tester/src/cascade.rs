// THEORY:
// OpenCV's Haar cascades behind the engine's `ModelLoader` / `CascadeClassifier`
// seams. Model files are parsed on the blocking pool so the render loop's runtime
// stays responsive during startup. Every configured model must load, but only the
// frontal-face cascade is consulted per frame.

use blob_vision::{CascadeClassifier, DetectionParams, DetectionRect, ModelLoader, ModelSpec, VisionError};
use image::GrayImage;
use log::info;
use opencv::{
    core::{Mat, Rect, Size, Vector},
    objdetect,
    prelude::*,
};
use std::future::Future;

const FACE_MODEL: &str = "frontal_face";

pub struct LoadedCascade {
    name: String,
    cascade: objdetect::CascadeClassifier,
}

pub struct HaarCascadeLoader;

impl ModelLoader for HaarCascadeLoader {
    type Model = LoadedCascade;
    type Classifier = HaarFaceDetector;

    fn load_model(&self, spec: &ModelSpec) -> impl Future<Output = blob_vision::Result<LoadedCascade>> + Send {
        let spec = spec.clone();
        async move {
            let name = spec.name.clone();
            let loaded = tokio::task::spawn_blocking(move || {
                let path = spec.path.to_string_lossy().into_owned();
                let cascade = objdetect::CascadeClassifier::new(&path)
                    .map_err(|e| VisionError::ModelLoad { name: spec.name.clone(), reason: e.to_string() })?;
                if cascade.empty().unwrap_or(true) {
                    return Err(VisionError::ModelLoad { name: spec.name.clone(), reason: format!("{path} is empty") });
                }
                info!("loaded cascade '{}' from {path}", spec.name);
                Ok(LoadedCascade { name: spec.name, cascade })
            })
            .await
            .map_err(|e| VisionError::ModelLoad { name, reason: e.to_string() })?;
            loaded
        }
    }

    fn assemble(&self, models: Vec<LoadedCascade>) -> blob_vision::Result<HaarFaceDetector> {
        models
            .into_iter()
            .find(|model| model.name == FACE_MODEL)
            .map(|model| HaarFaceDetector { face: model.cascade })
            .ok_or_else(|| VisionError::ModelLoad { name: FACE_MODEL.into(), reason: "not configured".into() })
    }
}

pub struct HaarFaceDetector {
    face: objdetect::CascadeClassifier,
}

impl HaarFaceDetector {
    fn run(&mut self, gray: &GrayImage, params: &DetectionParams) -> opencv::Result<Vec<DetectionRect>> {
        let mat = Mat::from_slice_rows_cols(gray.as_raw(), gray.height() as usize, gray.width() as usize)?
            .try_clone()?;
        let mut faces = Vector::<Rect>::new();
        self.face.detect_multi_scale(
            &mat,
            &mut faces,
            params.scale_factor,
            params.min_neighbors,
            0,
            Size::new(params.min_size.0, params.min_size.1),
            Size::new(params.max_size.0, params.max_size.1),
        )?;
        Ok(faces.iter().map(|r| DetectionRect::new(r.x, r.y, r.width, r.height)).collect())
    }
}

impl CascadeClassifier for HaarFaceDetector {
    fn detect_multi_scale(&mut self, gray: &GrayImage, params: &DetectionParams) -> blob_vision::Result<Vec<DetectionRect>> {
        self.run(gray, params).map_err(|e| VisionError::Classifier(e.to_string()))
    }
}
