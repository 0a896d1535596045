//! Drives mounting and data updates through the render scheduler on a
//! deterministic host, the way a map view would across a few frames.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use foundation::domain::Domain;
use foundation::geometry::Feature;
use layers::consolidate::{Consolidated, LayerConsolidator};
use layers::host::{HostError, RecordingHost};
use layers::mount::{ConsolidatedLayers, LayerMounter};
use layers::order::{LayerOrderRegistry, OrderValidation};
use layers::visibility::LayerVisibility;
use runtime::batch::UpdateBatcher;
use runtime::host::ManualHost;
use runtime::scheduler::{RenderPriority, RenderScheduler, SchedulerConfig};
use runtime::task_queue::PriorityTaskQueue;
use tracing::debug;

pub type DomainData = (Domain, Arc<Vec<Feature>>);

#[derive(Debug)]
pub struct RenderOutcome {
    pub consolidated: Consolidated,
    pub draw_order: Vec<String>,
    pub validation: OrderValidation,
    pub source_writes: usize,
    pub batches: usize,
}

pub fn render(
    config: SchedulerConfig,
    inputs: Vec<DomainData>,
    visibility: LayerVisibility,
) -> Result<RenderOutcome, HostError> {
    let host = Rc::new(ManualHost::new());
    let scheduler = RenderScheduler::new(Rc::clone(&host), config);
    let map = Rc::new(RefCell::new(RecordingHost::new()));
    let mounter = Rc::new(RefCell::new(LayerMounter::new(LayerOrderRegistry::new())));
    let failure: Rc<RefCell<Option<HostError>>> = Rc::new(RefCell::new(None));

    {
        let (map, mounter, failure) = (Rc::clone(&map), Rc::clone(&mounter), Rc::clone(&failure));
        scheduler.schedule("mount-consolidated", RenderPriority::High, move || {
            let mut map = map.borrow_mut();
            let mut mounter = mounter.borrow_mut();
            let empty = Consolidated::default();
            if let Err(e) = ConsolidatedLayers::mount(&mut *map, &mut *mounter, &empty) {
                *failure.borrow_mut() = Some(e);
            }
        });
    }
    host.tick_frame();
    let failed = failure.borrow_mut().take();
    if let Some(e) = failed {
        return Err(e);
    }

    let latest: Rc<RefCell<BTreeMap<Domain, Arc<Vec<Feature>>>>> = Rc::default();
    let output: Rc<RefCell<Consolidated>> = Rc::default();
    let batches = Rc::new(RefCell::new(0usize));
    let batcher = {
        let (map, latest, output, batches) = (
            Rc::clone(&map),
            Rc::clone(&latest),
            Rc::clone(&output),
            Rc::clone(&batches),
        );
        UpdateBatcher::new(Rc::clone(&host), config, move |items: Vec<DomainData>| {
            let mut latest = latest.borrow_mut();
            latest.extend(items);
            let data = LayerConsolidator::new().consolidate_visible(
                latest.iter().map(|(d, f)| (*d, f.as_slice())),
                &visibility,
            );
            ConsolidatedLayers::update(&mut *map.borrow_mut(), &data);
            *output.borrow_mut() = data;
            *batches.borrow_mut() += 1;
        })
    };
    for (domain, features) in inputs {
        batcher.add(domain, features);
    }
    host.advance(config.batch_delay);
    host.run_idle();

    let validation = Rc::new(RefCell::new(OrderValidation::default()));
    let mut queue = PriorityTaskQueue::new(Rc::clone(&host), config.idle_timeout);
    {
        let (mounter, validation) = (Rc::clone(&mounter), Rc::clone(&validation));
        queue.register("validate-order", RenderPriority::High, move || {
            let report = LayerOrderRegistry::new().validate_order(mounter.borrow().mounted());
            *validation.borrow_mut() = report;
        });
    }
    queue.register("trace-draw-order", RenderPriority::Low, {
        let map = Rc::clone(&map);
        move || debug!(layers = ?map.borrow().layer_ids(), "draw order")
    });
    queue.flush();
    host.run_idle();

    let (draw_order, source_writes) = {
        let map = map.borrow();
        let ids: Vec<String> = map.layer_ids().into_iter().map(str::to_string).collect();
        (ids, map.source_writes())
    };
    let validation = validation.borrow().clone();
    let consolidated = output.borrow().clone();
    let batches = *batches.borrow();
    Ok(RenderOutcome {
        consolidated,
        draw_order,
        validation,
        source_writes,
        batches,
    })
}
