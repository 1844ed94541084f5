use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use evwarranty_auth::{Actor, Role};
use evwarranty_core::{
    CaseLineId, CompanyId, ServiceCenterId, StockId, TypeComponentId, UserId, WarehouseId,
};
use evwarranty_infra::{
    BulkAdjustmentRequest, InventoryServices, LogNotificationSink, ReserveRequest, SkuSerial,
};
use evwarranty_inventory::{AdjustmentType, TypeComponent, Warehouse};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Runtime;

const SKU: &str = "BAT-100";

struct Fixture {
    services: InventoryServices,
    warehouse: Warehouse,
    type_component: TypeComponent,
    admin: Actor,
    manager: Actor,
    serial_seq: AtomicU64,
}

impl Fixture {
    async fn new() -> Self {
        let services = InventoryServices::in_memory(Arc::new(LogNotificationSink));
        let company = CompanyId::new();
        let sc = ServiceCenterId::new();
        let warehouse = services
            .catalog
            .add_warehouse(Warehouse::for_service_center(
                WarehouseId::new(),
                "Bench SC",
                sc,
                company,
                Utc::now(),
            ))
            .await
            .unwrap();
        let type_component = services
            .catalog
            .add_type_component(
                TypeComponent::new(TypeComponentId::new(), SKU, "Battery pack", "battery", 100).unwrap(),
            )
            .await
            .unwrap();
        Self {
            services,
            warehouse,
            type_component,
            admin: Actor::company(UserId::new(), Role::EmvAdmin, company),
            manager: Actor::service_center(UserId::new(), Role::ServiceCenterManager, sc, Some(company)),
            serial_seq: AtomicU64::new(0),
        }
    }

    fn next_serials(&self, n: usize) -> Vec<SkuSerial> {
        (0..n)
            .map(|_| SkuSerial {
                sku: SKU.to_string(),
                serial_number: format!("SN-{}", self.serial_seq.fetch_add(1, Ordering::Relaxed)),
            })
            .collect()
    }

    async fn receive(&self, n: usize) {
        let report = self
            .services
            .adjustments
            .create_bulk_adjustments(
                &self.admin,
                BulkAdjustmentRequest {
                    warehouse_id: self.warehouse.id,
                    adjustment_type: AdjustmentType::In,
                    reason: "bench receipt".to_string(),
                    note: None,
                    components: self.next_serials(n),
                },
            )
            .await
            .unwrap();
        assert_eq!(report.failed, 0);
    }

    async fn stock_id(&self) -> StockId {
        let lines = self
            .services
            .reporting
            .stock_lines(&self.manager, Some(self.warehouse.id), false)
            .await
            .unwrap();
        lines
            .into_iter()
            .find(|l| l.type_component_id == self.type_component.id)
            .unwrap()
            .stock_id
    }
}

fn bench_reservation_latency(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let fixture = rt.block_on(async {
        let f = Fixture::new().await;
        f.receive(100).await;
        f
    });

    let mut group = c.benchmark_group("reservation_latency");
    group.sample_size(200);

    group.bench_function("reserve_then_cancel", |b| {
        b.iter(|| {
            rt.block_on(async {
                let reservation = fixture
                    .services
                    .reservations
                    .reserve_components(
                        &fixture.manager,
                        ReserveRequest {
                            case_line_id: CaseLineId::new(),
                            type_component_id: fixture.type_component.id,
                            quantity: 1,
                            warehouse_id: None,
                        },
                    )
                    .await
                    .unwrap();
                fixture
                    .services
                    .reservations
                    .cancel_reservation(&fixture.manager, reservation.id_typed(), None)
                    .await
                    .unwrap();
                black_box(reservation);
            })
        });
    });

    group.finish();
}

fn bench_bulk_adjustment_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let fixture = rt.block_on(Fixture::new());

    let mut group = c.benchmark_group("bulk_adjustment_throughput");
    for batch_size in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &batch_size| {
                b.iter(|| rt.block_on(fixture.receive(batch_size)));
            },
        );
    }
    group.finish();
}

fn bench_history_page(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (fixture, stock_id) = rt.block_on(async {
        let f = Fixture::new().await;
        for _ in 0..500 {
            f.receive(1).await;
        }
        let stock_id = f.stock_id().await;
        (f, stock_id)
    });

    let mut group = c.benchmark_group("stock_history");
    for limit in [10u32, 100].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(limit), limit, |b, &limit| {
            b.iter(|| {
                let page = rt
                    .block_on(
                        fixture
                            .services
                            .adjustments
                            .get_stock_history(&fixture.manager, stock_id, 3, limit),
                    )
                    .unwrap();
                black_box(page);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_reservation_latency,
    bench_bulk_adjustment_throughput,
    bench_history_page
);
criterion_main!(benches);
