//! Frame-by-frame overlay runs.
//!
//! Both pipelines share one loop: seek the source to the synchronizer's start frame,
//! then read a frame, map it to a stream frame, annotate it and write it out. The loop
//! ends when the video ends, the stream is exhausted or the cancel flag is raised.
//! Per-record failures are logged once and skipped; source and sink errors abort.

use anyhow::{anyhow, bail, Result};
use image::RgbImage;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::classify::{ActivityClassifier, ActivityStatus, Subject};
use crate::config::{OverlayConfig, SyncSettings, TrainNames};
use crate::geometry::{PixelBox, Resolution};
use crate::history::WorkerHistory;
use crate::pose::{KeypointIndex, KeypointSet, KeypointSpace};
use crate::render::Renderer;
use crate::report::{Event, EventLog};
use crate::schema::{DetectionIndex, DetectionRecord, FrameIndex, PoseIndex};
use crate::sync::{FrameSynchronizer, SyncMode, SyncParams, SyncStep};
use crate::video::{FrameSink, FrameSource, VideoInfo};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    VideoEnded,
    DataExhausted,
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::VideoEnded => "video ended",
            StopReason::DataExhausted => "data exhausted",
            StopReason::Interrupted => "interrupted",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub mode: SyncMode,
    pub stop: StopReason,
    /// Video frame the run started reading at.
    pub start_frame: u64,
    /// Frames read since `start_frame`.
    pub frames_read: u64,
    pub frames_written: u64,
    /// Written frames whose stream frame had at least one record.
    pub frames_with_data: u64,
    pub subjects_rendered: u64,
    pub records_skipped: u64,
    pub last_stream_frame: Option<i64>,
}

impl RunSummary {
    fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            stop: StopReason::VideoEnded,
            start_frame: 0,
            frames_read: 0,
            frames_written: 0,
            frames_with_data: 0,
            subjects_rendered: 0,
            records_skipped: 0,
            last_stream_frame: None,
        }
    }
}

/// Progress callback invoked after every written frame.
pub trait RunObserver {
    fn on_start(&mut self, _info: &VideoInfo, _summary: &RunSummary) {}
    fn on_frame(&mut self, _summary: &RunSummary) {}
    fn on_finish(&mut self, _summary: &RunSummary) {}
}

#[derive(Debug, Default)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Logs a warning the first time it fires, and only counts afterwards.
#[derive(Debug, Default)]
pub struct WarnOnce {
    what: &'static str,
    hits: u64,
}

impl WarnOnce {
    pub fn new(what: &'static str) -> Self {
        Self { what, hits: 0 }
    }

    pub fn warn(&mut self, detail: impl fmt::Display) {
        if self.hits == 0 {
            log::warn!("{}: {} (further occurrences are not logged)", self.what, detail);
        }
        self.hits += 1;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }
}

/// What annotating one frame produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct FrameOutcome {
    had_data: bool,
    rendered: u64,
    skipped: u64,
}

/// What the loop does with the frames left once the stream is exhausted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AfterData {
    Stop,
    PassThrough,
}

#[derive(Clone, Debug)]
struct RunControl {
    progress_every: u64,
    after_data: AfterData,
    cancel: Arc<AtomicBool>,
}

fn synchronizer_for<T>(
    index: &FrameIndex<T>,
    info: &VideoInfo,
    sync: &SyncSettings,
) -> Result<FrameSynchronizer> {
    let (stream_min_frame, stream_max_frame) = index
        .range()
        .ok_or_else(|| anyhow!("stream has no frames to overlay"))?;
    FrameSynchronizer::new(SyncParams {
        total_video_frames: info.total_frames,
        stream_min_frame,
        stream_max_frame,
        speed_factor: sync.speed_factor,
        offset: sync.offset,
    })
}

fn drive<F>(
    source: &mut dyn FrameSource,
    sink: &mut dyn FrameSink,
    mut synchronizer: FrameSynchronizer,
    control: &RunControl,
    observer: &mut dyn RunObserver,
    mut annotate: F,
) -> Result<RunSummary>
where
    F: FnMut(&mut RgbImage, i64) -> FrameOutcome,
{
    let info = source.info();
    let mut summary = RunSummary::new(synchronizer.mode());
    let params = synchronizer.params();
    log::info!(
        "sync: {:?} mode, stream frames {}..={} over {} ({} frames, {:.3} fps) -> {}",
        synchronizer.mode(),
        params.stream_min_frame,
        params.stream_max_frame,
        source.describe(),
        info.total_frames,
        info.fps,
        sink.describe()
    );
    if let Some(start) = synchronizer.seek_frame() {
        log::info!("sync: seeking video to frame {}", start);
        source.seek(start)?;
    }
    summary.start_frame = source.position();
    observer.on_start(&info, &summary);
    let mut passing_through = false;

    loop {
        if control.cancel.load(Ordering::SeqCst) {
            log::warn!("interrupt received; stopping after {} frames", summary.frames_written);
            summary.stop = StopReason::Interrupted;
            break;
        }
        let Some(mut frame) = source.next_frame()? else {
            summary.stop = StopReason::VideoEnded;
            break;
        };
        summary.frames_read += 1;

        match synchronizer.advance(source.position()) {
            SyncStep::Target(target) => {
                summary.last_stream_frame = Some(target);
                let outcome = annotate(&mut frame, target);
                if outcome.had_data {
                    summary.frames_with_data += 1;
                }
                summary.subjects_rendered += outcome.rendered;
                summary.records_skipped += outcome.skipped;
            }
            SyncStep::Exhausted if control.after_data == AfterData::PassThrough => {
                if !passing_through {
                    log::info!(
                        "sync: stream data exhausted at video frame {}; copying the rest",
                        source.position()
                    );
                    passing_through = true;
                }
            }
            SyncStep::Exhausted => {
                log::info!("sync: stream data exhausted at video frame {}", source.position());
                summary.stop = StopReason::DataExhausted;
                break;
            }
        }

        sink.write_frame(&frame)?;
        summary.frames_written += 1;
        observer.on_frame(&summary);

        if summary.frames_written % control.progress_every == 0 {
            log::info!(
                "progress: video frame {} -> stream frame {:?} ({} written)",
                source.position(),
                summary.last_stream_frame,
                summary.frames_written
            );
        }
    }

    observer.on_finish(&summary);
    Ok(summary)
}

/// Detection overlay: boxes, labels, skeletons, classification and the event log.
pub struct OverlayPipeline {
    detections: DetectionIndex,
    keypoint_space: KeypointSpace,
    sync: SyncSettings,
    classifier: ActivityClassifier,
    renderer: Renderer,
    history: WorkerHistory,
    known_trains: TrainNames,
    control: RunControl,
    events: EventLog,
}

impl OverlayPipeline {
    pub fn new(config: &OverlayConfig, detections: DetectionIndex) -> Result<Self> {
        if detections.is_empty() {
            bail!("detection stream is empty");
        }
        Ok(Self {
            detections,
            keypoint_space: config.detection_keypoint_space,
            sync: config.sync.clone(),
            classifier: ActivityClassifier::new(config.classifier.clone()),
            renderer: Renderer::new(&config.render)?,
            history: WorkerHistory::new(
                config.history_capacity,
                config.classifier.idle.max_displacement_px,
            ),
            known_trains: config.known_trains.clone(),
            control: RunControl {
                progress_every: config.progress_every,
                after_data: AfterData::Stop,
                cancel: Arc::new(AtomicBool::new(false)),
            },
            events: EventLog::new(),
        })
    }

    /// Shares a flag that stops the run between frames once set.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.control.cancel = cancel;
        self
    }

    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        observer: &mut dyn RunObserver,
    ) -> Result<RunSummary> {
        let info = source.info();
        let synchronizer = synchronizer_for(&self.detections, &info, &self.sync)?;
        let control = self.control.clone();
        let fps = info.fps;
        let mut skipped_records = WarnOnce::new("skipping detection record");

        let Self {
            detections,
            keypoint_space,
            classifier,
            renderer,
            history,
            known_trains,
            events,
            ..
        } = self;
        let mut ctx = AnnotateContext {
            keypoint_space: *keypoint_space,
            classifier,
            renderer,
            history,
            known_trains,
            events,
            fps,
        };

        let summary = drive(source, sink, synchronizer, &control, observer, |frame, target| {
            let Some(records) = detections.get(target) else {
                return FrameOutcome::default();
            };
            ctx.annotate(frame, target, records, &mut skipped_records)
        })?;

        if skipped_records.hits() > 0 {
            log::warn!("skipped {} detection records in total", skipped_records.hits());
        }
        Ok(summary)
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn into_events(self) -> EventLog {
        self.events
    }

    pub fn history(&self) -> &WorkerHistory {
        &self.history
    }
}

struct AnnotateContext<'a> {
    keypoint_space: KeypointSpace,
    classifier: &'a ActivityClassifier,
    renderer: &'a Renderer,
    history: &'a mut WorkerHistory,
    known_trains: &'a TrainNames,
    events: &'a mut EventLog,
    fps: f64,
}

impl AnnotateContext<'_> {
    fn annotate(
        &mut self,
        frame: &mut RgbImage,
        stream_frame: i64,
        records: &[DetectionRecord],
        skipped: &mut WarnOnce,
    ) -> FrameOutcome {
        let res = Resolution::new(frame.width(), frame.height());
        let mut outcome = FrameOutcome {
            had_data: !records.is_empty(),
            ..FrameOutcome::default()
        };

        // Trains go first so people are drawn on top of them.
        let trains = records.iter().filter(|r| r.is_train());
        let people = records.iter().filter(|r| !r.is_train());
        for record in trains.chain(people) {
            let result = if record.is_train() {
                self.annotate_train(frame, stream_frame, record, res)
            } else {
                self.annotate_person(frame, stream_frame, record, res)
            };
            match result {
                Ok(()) => outcome.rendered += 1,
                Err(e) => {
                    skipped.warn(format_args!(
                        "frame {} id {}: {}",
                        stream_frame, record.id, e
                    ));
                    outcome.skipped += 1;
                }
            }
        }
        outcome
    }

    fn annotate_train(
        &mut self,
        frame: &mut RgbImage,
        stream_frame: i64,
        record: &DetectionRecord,
        res: Resolution,
    ) -> Result<()> {
        let (bbox, _) = resolve_geometry(record, self.keypoint_space, res)?;
        let name = self.known_trains.name(record.id);
        self.renderer.draw_train(frame, &bbox, &name);
        self.events.push(Event::new(
            stream_frame,
            self.fps,
            name,
            record.role.clone(),
            ActivityStatus::RepairObject,
        ));
        Ok(())
    }

    fn annotate_person(
        &mut self,
        frame: &mut RgbImage,
        stream_frame: i64,
        record: &DetectionRecord,
        res: Resolution,
    ) -> Result<()> {
        let (bbox, keypoints) = resolve_geometry(record, self.keypoint_space, res)?;
        let entry = self.history.observe(record.id, stream_frame, &bbox);
        let status = self.classifier.classify(&Subject {
            id: record.id,
            bbox,
            keypoints: keypoints.as_ref(),
            history: Some(entry),
        });

        let worker_type = record.worker_type();
        let color = self.renderer.color_for(worker_type, status);
        let label = format!(
            "{} | {} | {}",
            record.id,
            worker_type.to_uppercase(),
            status
        );
        self.renderer.draw_subject(frame, &bbox, &label, color);
        if let Some(keypoints) = &keypoints {
            self.renderer.draw_skeleton(frame, keypoints);
        }
        if status.is_danger() {
            log::debug!("frame {}: subject {} {}", stream_frame, record.id, status);
        }
        self.events.push(Event::new(
            stream_frame,
            self.fps,
            record.id.to_string(),
            worker_type.to_string(),
            status,
        ));
        Ok(())
    }
}

/// Pixel-space box and keypoints for a record on a frame of `res`.
///
/// The record's own bbox wins; otherwise the box encloses its detected keypoints.
fn resolve_geometry(
    record: &DetectionRecord,
    space: KeypointSpace,
    res: Resolution,
) -> Result<(PixelBox, Option<KeypointSet>)> {
    let keypoints = record
        .keypoints
        .as_ref()
        .map(|kps| kps.to_pixel_space(space, res));
    let bbox = match (&record.bbox, &keypoints) {
        (Some(bbox), _) => {
            if ![bbox.cx, bbox.cy, bbox.w, bbox.h].iter().all(|v| v.is_finite()) {
                bail!("bbox has non-finite coordinates");
            }
            bbox.to_clamped_pixels(res)
        }
        (None, Some(kps)) => kps
            .bounding_box()
            .ok_or_else(|| anyhow!("no bbox and every keypoint is a sentinel"))?
            .clamp_to(res),
        (None, None) => bail!("record has neither bbox nor keypoints"),
    };
    Ok((bbox, keypoints))
}

/// Skeleton-only overlay of a pose-frame stream.
///
/// Every video frame is written; frames past the end of the pose data are copied as they are.
pub struct SkeletonPipeline {
    poses: PoseIndex,
    keypoint_space: KeypointSpace,
    sync: SyncSettings,
    renderer: Renderer,
    control: RunControl,
}

impl SkeletonPipeline {
    pub fn new(config: &OverlayConfig, poses: PoseIndex) -> Result<Self> {
        if poses.is_empty() {
            bail!("pose stream is empty");
        }
        Ok(Self {
            poses,
            keypoint_space: config.skeleton.keypoint_space,
            sync: config.skeleton.sync.clone(),
            renderer: Renderer::new(&config.render)?,
            control: RunControl {
                progress_every: config.progress_every,
                after_data: AfterData::PassThrough,
                cancel: Arc::new(AtomicBool::new(false)),
            },
        })
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.control.cancel = cancel;
        self
    }

    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        observer: &mut dyn RunObserver,
    ) -> Result<RunSummary> {
        let info = source.info();
        let synchronizer = synchronizer_for(&self.poses, &info, &self.sync)?;
        let control = self.control.clone();
        let mut odd_layout = WarnOnce::new("pose is not a 17-point COCO layout");
        let mut nothing_drawn = WarnOnce::new("pose has no detected keypoints");
        let poses = &self.poses;
        let renderer = &self.renderer;
        let space = self.keypoint_space;

        drive(source, sink, synchronizer, &control, observer, |frame, target| {
            let Some(people) = poses.get(target) else {
                return FrameOutcome::default();
            };
            let res = Resolution::new(frame.width(), frame.height());
            let mut outcome = FrameOutcome {
                had_data: !people.is_empty(),
                ..FrameOutcome::default()
            };
            for pose in people {
                if pose.len() != KeypointIndex::COUNT {
                    odd_layout.warn(format_args!(
                        "frame {} has {} keypoints",
                        target,
                        pose.len()
                    ));
                }
                let stats = renderer.draw_skeleton(frame, &pose.to_pixel_space(space, res));
                if stats.points == 0 {
                    nothing_drawn.warn(format_args!("frame {}", target));
                    outcome.skipped += 1;
                } else {
                    outcome.rendered += 1;
                }
            }
            outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::NormBox;
    use crate::pose::Keypoint;
    use crate::video::{NullSink, SyntheticSource};
    use image::Rgb;

    fn config() -> OverlayConfig {
        let mut cfg = OverlayConfig::from_toml_str("").expect("default config");
        cfg.sync.speed_factor = 1.0;
        cfg
    }

    fn person(frame: i64, id: i64, bbox: NormBox) -> DetectionRecord {
        DetectionRecord {
            frame,
            role: "worker".to_string(),
            id,
            class: None,
            bbox: Some(bbox),
            keypoints: None,
        }
    }

    fn index(records: Vec<DetectionRecord>) -> DetectionIndex {
        let mut index = DetectionIndex::new();
        for record in records {
            index.push(record.frame, record);
        }
        index
    }

    #[test]
    fn warn_once_counts_every_hit() {
        let mut latch = WarnOnce::new("test");
        latch.warn("first");
        latch.warn("second");
        assert_eq!(latch.hits(), 2);
    }

    #[test]
    fn overlay_records_one_event_per_subject_per_frame() -> Result<()> {
        let standing = NormBox::new(0.5, 0.5, 0.1, 0.4);
        let lying = NormBox::new(0.3, 0.8, 0.4, 0.1);
        let mut train = person(2, 82, NormBox::new(0.5, 0.3, 0.8, 0.3));
        train.role = "train".to_string();
        let detections = index(vec![
            person(0, 1, standing),
            person(1, 1, standing),
            person(1, 2, lying),
            train,
            person(2, 1, standing),
        ]);

        let mut source = SyntheticSource::parse("stub://160x120@10/10")?;
        let mut sink = NullSink::default();
        let mut pipeline = OverlayPipeline::new(&config(), detections)?;
        let summary = pipeline.run(&mut source, &mut sink, &mut NoopObserver)?;

        assert_eq!(summary.mode, SyncMode::Scaled);
        assert_eq!(summary.stop, StopReason::DataExhausted);
        assert_eq!(summary.frames_written, 3);
        assert_eq!(sink.frames_written(), 3);
        assert_eq!(summary.subjects_rendered, 5);

        let events = pipeline.events().events();
        assert_eq!(events.len(), 5);
        assert_eq!(events[1].status, ActivityStatus::Working);
        assert_eq!(events[2].status, ActivityStatus::FallDetected);
        assert_eq!(events[2].is_danger, 1);
        // the train is listed before the person of the same frame
        assert_eq!(events[3].id, "No.4521");
        assert_eq!(events[3].status, ActivityStatus::RepairObject);
        assert_eq!(events[4].id, "1");
        assert_eq!(pipeline.history().get(1).map(|e| e.sightings), Some(3));
        Ok(())
    }

    #[test]
    fn keypoint_only_record_gets_an_enclosing_box() -> Result<()> {
        let mut points = vec![Keypoint::new(0.0, 0.0); KeypointIndex::COUNT];
        points[5] = Keypoint::new(0.25, 0.25);
        points[12] = Keypoint::new(0.5, 0.75);
        let record = DetectionRecord {
            frame: 0,
            role: "worker".to_string(),
            id: 3,
            class: Some("janitor".to_string()),
            bbox: None,
            keypoints: Some(KeypointSet::new(points)),
        };
        let (bbox, kps) =
            resolve_geometry(&record, KeypointSpace::Normalized, Resolution::new(200, 100))?;
        assert_eq!(bbox, PixelBox::new(50, 25, 100, 75));
        assert!(kps.is_some());
        Ok(())
    }

    #[test]
    fn unresolvable_record_is_skipped_not_fatal() -> Result<()> {
        let sentinel_only = DetectionRecord {
            frame: 0,
            role: "worker".to_string(),
            id: 9,
            class: None,
            bbox: None,
            keypoints: Some(KeypointSet::new(vec![Keypoint::new(0.0, 0.0); 17])),
        };
        let detections = index(vec![sentinel_only, person(0, 1, NormBox::new(0.5, 0.5, 0.2, 0.5))]);
        let mut source = SyntheticSource::parse("stub://64x64@30/5")?;
        let mut pipeline = OverlayPipeline::new(&config(), detections)?;
        let summary = pipeline.run(&mut source, &mut NullSink::default(), &mut NoopObserver)?;
        assert_eq!(summary.records_skipped, 1);
        assert_eq!(summary.subjects_rendered, 1);
        assert_eq!(pipeline.events().len(), 1);
        Ok(())
    }

    #[test]
    fn cancel_flag_stops_before_first_frame() -> Result<()> {
        let detections = index(vec![person(0, 1, NormBox::new(0.5, 0.5, 0.2, 0.5))]);
        let cancel = Arc::new(AtomicBool::new(true));
        let mut pipeline = OverlayPipeline::new(&config(), detections)?.with_cancel_flag(cancel);
        let mut source = SyntheticSource::parse("stub://64x64@30/5")?;
        let summary = pipeline.run(&mut source, &mut NullSink::default(), &mut NoopObserver)?;
        assert_eq!(summary.stop, StopReason::Interrupted);
        assert_eq!(summary.frames_written, 0);
        assert!(pipeline.events().is_empty());
        Ok(())
    }

    #[test]
    fn short_video_ends_before_data() -> Result<()> {
        let detections = index(vec![
            person(0, 1, NormBox::new(0.5, 0.5, 0.2, 0.5)),
            person(100, 1, NormBox::new(0.5, 0.5, 0.2, 0.5)),
        ]);
        let mut source = SyntheticSource::parse("stub://32x32@30/4")?;
        let mut pipeline = OverlayPipeline::new(&config(), detections)?;
        let summary = pipeline.run(&mut source, &mut NullSink::default(), &mut NoopObserver)?;
        assert_eq!(summary.stop, StopReason::VideoEnded);
        assert_eq!(summary.frames_written, 4);
        assert_eq!(summary.frames_with_data, 1);
        Ok(())
    }

    #[test]
    fn skeleton_pipeline_draws_detected_points() -> Result<()> {
        let mut points = vec![Keypoint::new(0.0, 0.0); KeypointIndex::COUNT];
        points[5] = Keypoint::new(20.0, 20.0);
        points[6] = Keypoint::new(40.0, 20.0);
        let mut poses = PoseIndex::new();
        poses.push(0, KeypointSet::new(points));

        let mut source = SyntheticSource::parse("stub://64x64@30/3")?;
        let mut sink = RecordingSink::default();
        let mut pipeline = SkeletonPipeline::new(&config(), poses)?;
        let summary = pipeline.run(&mut source, &mut sink, &mut NoopObserver)?;
        // frames past the pose data are still written, untouched
        assert_eq!(summary.stop, StopReason::VideoEnded);
        assert_eq!(summary.frames_written, 3);
        assert_eq!(summary.frames_with_data, 1);
        assert_eq!(summary.subjects_rendered, 1);
        assert_eq!(summary.last_stream_frame, Some(0));
        assert_eq!(sink.frames[0].get_pixel(30, 20), &Rgb(crate::render::BONE_COLOR));
        assert_eq!(sink.frames[1].get_pixel(30, 20), &Rgb([30, 20, 1]));
        assert_eq!(sink.frames[2].get_pixel(30, 20), &Rgb([30, 20, 2]));
        Ok(())
    }

    #[test]
    fn far_off_frame_keypoints_do_not_abort_the_run() -> Result<()> {
        let mut points = vec![Keypoint::new(0.5, 0.5); KeypointIndex::COUNT];
        points[0] = Keypoint::new(3.0e9, 3.0e9);
        points[1] = Keypoint::new(f64::NAN, 0.5);
        let mut record = person(0, 1, NormBox::new(0.5, 0.5, 0.2, 0.5));
        record.keypoints = Some(KeypointSet::new(points));

        let mut source = SyntheticSource::parse("stub://64x64@30/3")?;
        let mut pipeline = OverlayPipeline::new(&config(), index(vec![record]))?;
        let summary = pipeline.run(&mut source, &mut NullSink::default(), &mut NoopObserver)?;
        assert_eq!(summary.frames_written, 1);
        assert_eq!(summary.subjects_rendered, 1);
        assert_eq!(pipeline.events().len(), 1);
        Ok(())
    }

    #[derive(Default)]
    struct StartRecorder {
        total_frames: u64,
        start_frame: Option<u64>,
        last_read: u64,
    }

    impl RunObserver for StartRecorder {
        fn on_start(&mut self, info: &VideoInfo, summary: &RunSummary) {
            self.total_frames = info.total_frames;
            self.start_frame = Some(summary.start_frame);
        }

        fn on_frame(&mut self, summary: &RunSummary) {
            self.last_read = summary.frames_read;
        }
    }

    #[test]
    fn observer_sees_seek_frame_and_reads_after_it() -> Result<()> {
        let mut poses = PoseIndex::new();
        poses.push(10, KeypointSet::new(vec![Keypoint::new(8.0, 8.0); 17]));
        poses.push(40, KeypointSet::new(vec![Keypoint::new(8.0, 8.0); 17]));
        let mut cfg = config();
        cfg.skeleton.sync.speed_factor = 0.5;

        let mut source = SyntheticSource::parse("stub://32x32@30/50")?;
        let mut observer = StartRecorder::default();
        let mut pipeline = SkeletonPipeline::new(&cfg, poses)?;
        let summary = pipeline.run(&mut source, &mut NullSink::default(), &mut observer)?;

        assert_eq!(summary.start_frame, 20);
        assert_eq!(observer.start_frame, Some(20));
        // reads never outrun the frames left after the seek
        assert_eq!(observer.last_read, observer.total_frames - 20);
        assert_eq!(summary.frames_written, 30);
        Ok(())
    }

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<RgbImage>,
    }

    impl FrameSink for RecordingSink {
        fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            Ok(())
        }

        fn frames_written(&self) -> u64 {
            self.frames.len() as u64
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }
}
