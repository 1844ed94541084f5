//! Integration tests for the inventory engines over the in-memory store.
//!
//! Flows: reservation lifecycle, concurrent reservations, bulk uploads,
//! transfer lifecycle (partial approval, ship, receive, cancel), reporting.
//!
//! Verifies:
//! - `0 <= reserved <= in_stock` after every operation
//! - Failed operations leave quantities untouched
//! - Ship + receive conserves the number of units
//! - History deltas reconcile with the bucket
//! - Notifications are published after commit

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use serde_json::Value as JsonValue;

    use evwarranty_auth::{Actor, Role};
    use evwarranty_core::{
        CaseLineId, CompanyId, ServiceCenterId, TypeComponentId, UserId, WarehouseId,
    };
    use evwarranty_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
    use evwarranty_inventory::{
        AdjustmentType, ComponentStatus, HistoryCause, ItemApproval, ReservationStatus, Stock,
        TransferStatus, TypeComponent, Warehouse,
    };

    use crate::adjustments::{AdjustmentRequest, BulkAdjustmentRequest, BulkItemResult, SkuSerial};
    use crate::config::InventoryConfig;
    use crate::error::InventoryError;
    use crate::notify::BusNotificationSink;
    use crate::reservations::ReserveRequest;
    use crate::services::InventoryServices;
    use crate::store::{InMemoryInventoryStore, InventoryStore};
    use crate::transfers::{
        ApprovalRequest, NewTransferRequest, ReceiptRequest, ShipmentRequest, TransferItemInput,
    };

    type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;

    const BATTERY: &str = "BAT-100";

    struct World {
        services: InventoryServices,
        store: InMemoryInventoryStore,
        bus: Arc<Bus>,
        central: Warehouse,
        sc_warehouse: Warehouse,
        other_warehouse: Warehouse,
        battery: TypeComponent,
        admin: Actor,
        coordinator: Actor,
        manager: Actor,
        technician: Actor,
        other_manager: Actor,
    }

    async fn setup() -> World {
        setup_with(InventoryConfig {
            default_reorder_point: 2,
            ..InventoryConfig::default()
        })
        .await
    }

    async fn setup_with(config: InventoryConfig) -> World {
        evwarranty_observability::init_for_tests();
        let store = InMemoryInventoryStore::new();
        let bus: Arc<Bus> = Arc::new(InMemoryEventBus::new());
        let services = InventoryServices::new(
            Arc::new(store.clone()),
            Arc::new(BusNotificationSink::new(bus.clone())),
            config,
        );

        let company = CompanyId::new();
        let sc = ServiceCenterId::new();
        let other_sc = ServiceCenterId::new();
        let now = Utc::now();

        let central = services
            .catalog
            .add_warehouse(Warehouse::for_company(WarehouseId::new(), "Central", company, true, now))
            .await
            .unwrap();
        let sc_warehouse = services
            .catalog
            .add_warehouse(Warehouse::for_service_center(WarehouseId::new(), "SC North", sc, company, now))
            .await
            .unwrap();
        let other_warehouse = services
            .catalog
            .add_warehouse(Warehouse::for_service_center(
                WarehouseId::new(),
                "SC South",
                other_sc,
                company,
                now,
            ))
            .await
            .unwrap();
        let battery = services
            .catalog
            .add_type_component(
                TypeComponent::new(TypeComponentId::new(), BATTERY, "Battery pack", "battery", 250_000)
                    .unwrap(),
            )
            .await
            .unwrap();

        World {
            services,
            store,
            bus,
            central,
            sc_warehouse,
            other_warehouse,
            battery,
            admin: Actor::company(UserId::new(), Role::EmvAdmin, company),
            coordinator: Actor::company(UserId::new(), Role::PartsCoordinatorCompany, company),
            manager: Actor::service_center(UserId::new(), Role::ServiceCenterManager, sc, Some(company)),
            technician: Actor::service_center(
                UserId::new(),
                Role::ServiceCenterTechnician,
                sc,
                Some(company),
            ),
            other_manager: Actor::service_center(
                UserId::new(),
                Role::ServiceCenterManager,
                other_sc,
                Some(company),
            ),
        }
    }

    impl World {
        /// Receive serials into a warehouse through a bulk IN upload.
        async fn stock_in(&self, warehouse: &Warehouse, serials: &[&str]) -> Stock {
            let report = self
                .services
                .adjustments
                .create_bulk_adjustments(
                    &self.admin,
                    BulkAdjustmentRequest {
                        warehouse_id: warehouse.id,
                        adjustment_type: AdjustmentType::In,
                        reason: "initial receipt".to_string(),
                        note: None,
                        components: serials
                            .iter()
                            .map(|s| SkuSerial {
                                sku: BATTERY.to_string(),
                                serial_number: s.to_string(),
                            })
                            .collect(),
                    },
                )
                .await
                .unwrap();
            assert_eq!(report.failed, 0, "{report:?}");
            self.stock(warehouse).await.unwrap()
        }

        async fn stock(&self, warehouse: &Warehouse) -> Option<Stock> {
            let mut tx = self.store.begin().await.unwrap();
            let stock = tx.find_stock(warehouse.id, self.battery.id).await.unwrap();
            tx.rollback().await.unwrap();
            stock
        }

        async fn component_status(&self, serial: &str) -> (ComponentStatus, Option<WarehouseId>) {
            let mut tx = self.store.begin().await.unwrap();
            let unit = tx.find_component_by_serial(serial).await.unwrap().unwrap();
            tx.rollback().await.unwrap();
            (unit.status, unit.warehouse_id)
        }

        fn reserve(&self, quantity: i64) -> ReserveRequest {
            ReserveRequest {
                case_line_id: CaseLineId::new(),
                type_component_id: self.battery.id,
                quantity,
                warehouse_id: None,
            }
        }

        fn battery_request(&self, quantity: i64) -> NewTransferRequest {
            NewTransferRequest {
                requesting_warehouse_id: None,
                items: vec![TransferItemInput {
                    sku: Some(BATTERY.to_lowercase()),
                    quantity_requested: quantity,
                    ..TransferItemInput::default()
                }],
            }
        }
    }

    fn quantities(stock: &Stock) -> (i64, i64, i64) {
        (
            stock.quantity_in_stock(),
            stock.quantity_reserved(),
            stock.quantity_available(),
        )
    }

    fn kind(err: &InventoryError) -> &'static str {
        err.kind()
    }

    fn event_types(sub: &Subscription<EventEnvelope<JsonValue>>) -> Vec<String> {
        sub.drain().iter().map(|e| e.event_type().to_string()).collect()
    }

    #[tokio::test]
    async fn reserve_pick_up_and_install_consumes_stock() {
        let w = setup().await;
        w.stock_in(&w.sc_warehouse, &["SN-1", "SN-2", "SN-3", "SN-4"]).await;

        let reservation = w
            .services
            .reservations
            .reserve_components(&w.manager, w.reserve(2))
            .await
            .unwrap();
        assert_eq!(reservation.status(), ReservationStatus::Pending);
        assert_eq!(reservation.component_ids().len(), 2);
        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (4, 2, 2));

        let picked = w
            .services
            .reservations
            .pickup_reserved_components(&w.technician, &[reservation.id_typed()], w.technician.user_id)
            .await
            .unwrap();
        assert_eq!(picked[0].status(), ReservationStatus::PickedUp);
        // Pick-up is a hand-off only.
        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (4, 2, 2));

        let installation = w
            .services
            .reservations
            .install_component(&w.technician, reservation.id_typed())
            .await
            .unwrap();
        assert_eq!(installation.reservation.status(), ReservationStatus::Installed);
        assert_eq!(installation.components.len(), 2);
        assert!(installation
            .components
            .iter()
            .all(|c| c.status == ComponentStatus::Installed && c.warehouse_id.is_none()));
        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (2, 0, 2));

        let usage = w
            .services
            .reporting
            .most_used_components(&w.admin, None, 10)
            .await
            .unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].sku, BATTERY);
        assert_eq!(usage[0].installations, 1);
        assert_eq!(usage[0].quantity, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reservations_never_oversell_the_last_unit() {
        let w = setup().await;
        w.stock_in(&w.sc_warehouse, &["SN-LAST"]).await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let engine = w.services.reservations.clone();
            let actor = w.manager.clone();
            let request = w.reserve(1);
            handles.push(tokio::spawn(async move {
                engine.reserve_components(&actor, request).await
            }));
        }

        let mut ok = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(err) => {
                    assert_eq!(kind(&err), "insufficient_stock");
                    insufficient += 1;
                }
            }
        }
        assert_eq!((ok, insufficient), (1, 1));
        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (1, 1, 0));
    }

    #[tokio::test]
    async fn reserving_exactly_available_succeeds_and_one_more_fails() {
        let w = setup().await;
        w.stock_in(&w.sc_warehouse, &["SN-1", "SN-2", "SN-3"]).await;

        let err = w
            .services
            .reservations
            .reserve_components(&w.manager, w.reserve(4))
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "insufficient_stock");
        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (3, 0, 3));

        w.services
            .reservations
            .reserve_components(&w.manager, w.reserve(3))
            .await
            .unwrap();
        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (3, 3, 0));
    }

    #[tokio::test]
    async fn cancelling_a_reservation_releases_its_units() {
        let w = setup().await;
        w.stock_in(&w.sc_warehouse, &["SN-1", "SN-2"]).await;

        let reservation = w
            .services
            .reservations
            .reserve_components(&w.manager, w.reserve(1))
            .await
            .unwrap();
        let cancelled = w
            .services
            .reservations
            .cancel_reservation(&w.manager, reservation.id_typed(), Some("case closed".into()))
            .await
            .unwrap();
        assert_eq!(cancelled.status(), ReservationStatus::Cancelled);
        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (2, 0, 2));
        assert_eq!(w.component_status("SN-1").await.0, ComponentStatus::InStock);
        assert_eq!(w.component_status("SN-2").await.0, ComponentStatus::InStock);

        let err = w
            .services
            .reservations
            .cancel_reservation(&w.manager, reservation.id_typed(), None)
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "invalid_state_transition");
    }

    #[tokio::test]
    async fn bulk_upload_reports_duplicates_and_applies_the_rest() {
        let w = setup().await;
        w.stock_in(&w.sc_warehouse, &["SN-EXISTING"]).await;

        let report = w
            .services
            .adjustments
            .create_bulk_adjustments(
                &w.admin,
                BulkAdjustmentRequest {
                    warehouse_id: w.sc_warehouse.id,
                    adjustment_type: AdjustmentType::In,
                    reason: "supplier delivery".to_string(),
                    note: None,
                    components: vec![
                        SkuSerial { sku: BATTERY.into(), serial_number: "SN-A".into() },
                        SkuSerial { sku: BATTERY.into(), serial_number: "SN-EXISTING".into() },
                        SkuSerial { sku: BATTERY.into(), serial_number: "SN-B".into() },
                        SkuSerial { sku: "NOPE-1".into(), serial_number: "SN-C".into() },
                    ],
                },
            )
            .await
            .unwrap();

        assert_eq!(report.items.len(), 4);
        assert_eq!((report.succeeded, report.failed), (2, 2));
        assert!(report.items[0].is_applied());
        assert!(matches!(
            &report.items[1].result,
            BulkItemResult::Failed { kind, .. } if kind == "duplicate_serial_number"
        ));
        assert!(report.items[2].is_applied());
        assert!(matches!(
            &report.items[3].result,
            BulkItemResult::Failed { kind, .. } if kind == "validation_error"
        ));
        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (3, 0, 3));
    }

    #[tokio::test]
    async fn serial_claimed_by_another_adjustment_fails_only_its_own_item() {
        let w = setup().await;
        let stock = w.stock_in(&w.sc_warehouse, &["SN-SEED"]).await;

        // A single adjustment takes one serial of the upload before it runs.
        w.services
            .adjustments
            .create_adjustment(
                &w.manager,
                AdjustmentRequest {
                    stock_id: stock.id,
                    adjustment_type: AdjustmentType::In,
                    reason: "walk-in return".to_string(),
                    note: None,
                    serial_numbers: vec!["SN-Y".to_string()],
                },
            )
            .await
            .unwrap();

        let report = w
            .services
            .adjustments
            .create_bulk_adjustments(
                &w.admin,
                BulkAdjustmentRequest {
                    warehouse_id: w.sc_warehouse.id,
                    adjustment_type: AdjustmentType::In,
                    reason: "supplier delivery".to_string(),
                    note: None,
                    components: ["SN-X", "SN-Y", "SN-Z"]
                        .iter()
                        .map(|s| SkuSerial { sku: BATTERY.into(), serial_number: s.to_string() })
                        .collect(),
                },
            )
            .await
            .unwrap();

        assert_eq!((report.succeeded, report.failed), (2, 1));
        assert!(report.items[0].is_applied());
        assert!(matches!(
            &report.items[1].result,
            BulkItemResult::Failed { kind, .. } if kind == "duplicate_serial_number"
        ));
        assert!(report.items[2].is_applied());
        // Both applied items share the group's single adjustment.
        assert_eq!(report.items[0].result, report.items[2].result);
        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (4, 0, 4));
        assert_eq!(w.component_status("SN-Y").await, (ComponentStatus::InStock, Some(w.sc_warehouse.id)));

        // OUT: a unit reserved in between fails alone as well.
        w.services
            .reservations
            .reserve_components(&w.manager, w.reserve(4))
            .await
            .unwrap();
        let report = w
            .services
            .adjustments
            .create_bulk_adjustments(
                &w.admin,
                BulkAdjustmentRequest {
                    warehouse_id: w.sc_warehouse.id,
                    adjustment_type: AdjustmentType::Out,
                    reason: "damaged in storage".to_string(),
                    note: None,
                    components: vec![SkuSerial { sku: BATTERY.into(), serial_number: "SN-X".into() }],
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            &report.items[0].result,
            BulkItemResult::Failed { kind, .. } if kind == "component_not_available"
        ));
        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (4, 4, 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_receipts_share_one_bucket() {
        let w = setup().await;
        let motor = w
            .services
            .catalog
            .add_type_component(
                TypeComponent::new(TypeComponentId::new(), "MOT-200", "Drive motor", "motor", 900_000)
                    .unwrap(),
            )
            .await
            .unwrap();

        const UPLOADS: usize = 8;
        const PER_UPLOAD: usize = 3;
        let mut handles = Vec::new();
        for upload in 0..UPLOADS {
            let engine = w.services.adjustments.clone();
            let actor = w.admin.clone();
            let request = BulkAdjustmentRequest {
                warehouse_id: w.other_warehouse.id,
                adjustment_type: AdjustmentType::In,
                reason: "opening balance".to_string(),
                note: None,
                components: (0..PER_UPLOAD)
                    .map(|n| SkuSerial {
                        sku: "MOT-200".into(),
                        serial_number: format!("MOT-{upload}-{n}"),
                    })
                    .collect(),
            };
            handles.push(tokio::spawn(async move {
                engine.create_bulk_adjustments(&actor, request).await
            }));
        }
        for handle in handles {
            let report = handle.await.unwrap().unwrap();
            assert_eq!(report.failed, 0, "{report:?}");
        }

        let mut tx = w.store.begin().await.unwrap();
        let buckets = tx
            .list_stocks(Some(std::slice::from_ref(&w.other_warehouse.id)))
            .await
            .unwrap();
        tx.rollback().await.unwrap();
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].type_component_id, motor.id);
        assert_eq!(buckets[0].quantity_in_stock(), (UPLOADS * PER_UPLOAD) as i64);
        assert_eq!(buckets[0].quantity_reserved(), 0);
    }

    #[tokio::test]
    async fn out_adjustment_on_a_reserved_unit_is_not_available() {
        let w = setup().await;
        let stock = w.stock_in(&w.sc_warehouse, &["SN-ONLY"]).await;
        w.services
            .reservations
            .reserve_components(&w.manager, w.reserve(1))
            .await
            .unwrap();

        let err = w
            .services
            .adjustments
            .create_adjustment(
                &w.manager,
                AdjustmentRequest {
                    stock_id: stock.id,
                    adjustment_type: AdjustmentType::Out,
                    reason: "damaged".to_string(),
                    note: None,
                    serial_numbers: vec!["SN-ONLY".to_string()],
                },
            )
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "component_not_available");
        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (1, 1, 0));
        assert_eq!(w.component_status("SN-ONLY").await.0, ComponentStatus::Reserved);
    }

    #[tokio::test]
    async fn partial_approval_ships_and_receives_the_approved_quantity() {
        let w = setup().await;
        w.stock_in(&w.central, &["C-1", "C-2", "C-3"]).await;

        let request = w
            .services
            .transfers
            .create_stock_transfer_request(&w.manager, w.battery_request(5))
            .await
            .unwrap();
        assert_eq!(request.status(), TransferStatus::PendingApproval);
        assert_eq!(request.items()[0].sku, BATTERY);
        assert_eq!(request.sourcing_warehouse_id(), None);

        let approved = w
            .services
            .transfers
            .approve_stock_transfer_request(
                &w.coordinator,
                ApprovalRequest {
                    request_id: request.id_typed(),
                    sourcing_warehouse_id: Some(w.central.id),
                    quantities: Vec::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(approved.status(), TransferStatus::Approved);
        assert_eq!(approved.items()[0].quantity_approved, Some(3));
        // Approval does not move stock.
        assert_eq!(quantities(&w.stock(&w.central).await.unwrap()), (3, 0, 3));

        let shipped = w
            .services
            .transfers
            .ship_stock_transfer_request(
                &w.coordinator,
                ShipmentRequest {
                    request_id: request.id_typed(),
                    estimated_delivery_date: None,
                    manifest: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(shipped.status(), TransferStatus::Shipped);
        assert_eq!(shipped.shipped_serials().len(), 3);
        assert_eq!(quantities(&w.stock(&w.central).await.unwrap()), (0, 0, 0));
        assert_eq!(w.component_status("C-1").await, (ComponentStatus::InTransit, None));

        let received = w
            .services
            .transfers
            .receive_stock_transfer_request(
                &w.manager,
                ReceiptRequest {
                    request_id: request.id_typed(),
                    received_serials: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(received.status(), TransferStatus::Received);

        let central = w.stock(&w.central).await.unwrap();
        let local = w.stock(&w.sc_warehouse).await.unwrap();
        assert_eq!(central.quantity_in_stock() + local.quantity_in_stock(), 3);
        assert_eq!(quantities(&local), (3, 0, 3));
        for serial in ["C-1", "C-2", "C-3"] {
            assert_eq!(
                w.component_status(serial).await,
                (ComponentStatus::InStock, Some(w.sc_warehouse.id))
            );
        }
    }

    #[tokio::test]
    async fn approval_caps_and_zero_approval() {
        let w = setup().await;
        w.stock_in(&w.central, &["C-1", "C-2", "C-3"]).await;
        let request = w
            .services
            .transfers
            .create_stock_transfer_request(&w.manager, w.battery_request(2))
            .await
            .unwrap();
        let line_no = request.items()[0].line_no;

        let err = w
            .services
            .transfers
            .approve_stock_transfer_request(
                &w.coordinator,
                ApprovalRequest {
                    request_id: request.id_typed(),
                    sourcing_warehouse_id: Some(w.central.id),
                    quantities: vec![ItemApproval { line_no, quantity_approved: 3 }],
                },
            )
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "validation_error");

        let err = w
            .services
            .transfers
            .approve_stock_transfer_request(
                &w.coordinator,
                ApprovalRequest {
                    request_id: request.id_typed(),
                    sourcing_warehouse_id: Some(w.central.id),
                    quantities: vec![ItemApproval { line_no, quantity_approved: 0 }],
                },
            )
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "insufficient_stock");

        let approved = w
            .services
            .transfers
            .approve_stock_transfer_request(
                &w.coordinator,
                ApprovalRequest {
                    request_id: request.id_typed(),
                    sourcing_warehouse_id: Some(w.central.id),
                    quantities: vec![ItemApproval { line_no, quantity_approved: 1 }],
                },
            )
            .await
            .unwrap();
        assert_eq!(approved.items()[0].quantity_approved, Some(1));
    }

    #[tokio::test]
    async fn shipped_transfers_cannot_be_cancelled() {
        let w = setup().await;
        w.stock_in(&w.central, &["C-1", "C-2"]).await;
        let request = w
            .services
            .transfers
            .create_warehouse_restock_request(&w.manager, w.battery_request(2))
            .await
            .unwrap();
        let id = request.id_typed();
        w.services
            .transfers
            .approve_stock_transfer_request(
                &w.coordinator,
                ApprovalRequest { request_id: id, sourcing_warehouse_id: None, quantities: Vec::new() },
            )
            .await
            .unwrap();
        w.services
            .transfers
            .ship_stock_transfer_request(
                &w.coordinator,
                ShipmentRequest { request_id: id, estimated_delivery_date: None, manifest: None },
            )
            .await
            .unwrap();

        let err = w
            .services
            .transfers
            .cancel_stock_transfer_request(&w.manager, id, "no longer needed")
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "invalid_state_transition");

        let still = w
            .services
            .transfers
            .get_stock_transfer_request(&w.manager, id)
            .await
            .unwrap();
        assert_eq!(still.status(), TransferStatus::Shipped);
        assert_eq!(quantities(&w.stock(&w.central).await.unwrap()), (0, 0, 0));
    }

    #[tokio::test]
    async fn pending_transfers_can_be_rejected_or_cancelled() {
        let w = setup().await;
        let first = w
            .services
            .transfers
            .create_stock_transfer_request(&w.manager, w.battery_request(1))
            .await
            .unwrap();
        let rejected = w
            .services
            .transfers
            .reject_stock_transfer_request(&w.coordinator, first.id_typed(), "use the other SC")
            .await
            .unwrap();
        assert_eq!(rejected.status(), TransferStatus::Rejected);
        assert_eq!(rejected.rejection_reason(), Some("use the other SC"));

        let second = w
            .services
            .transfers
            .create_stock_transfer_request(&w.manager, w.battery_request(1))
            .await
            .unwrap();
        let err = w
            .services
            .transfers
            .cancel_stock_transfer_request(&w.manager, second.id_typed(), "  ")
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "validation_error");
        let cancelled = w
            .services
            .transfers
            .cancel_stock_transfer_request(&w.manager, second.id_typed(), "duplicate")
            .await
            .unwrap();
        assert_eq!(cancelled.status(), TransferStatus::Cancelled);

        let listed = w
            .services
            .transfers
            .list_stock_transfer_requests(&w.manager, Some(TransferStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id_typed(), second.id_typed());
    }

    #[tokio::test]
    async fn restock_dispatch_with_manifest_and_strict_receipt() {
        let w = setup().await;
        w.stock_in(&w.central, &["C-1", "C-2", "C-3"]).await;
        let request = w
            .services
            .transfers
            .create_warehouse_restock_request(&w.manager, w.battery_request(2))
            .await
            .unwrap();
        let id = request.id_typed();
        let approved = w
            .services
            .transfers
            .approve_stock_transfer_request(
                &w.coordinator,
                ApprovalRequest { request_id: id, sourcing_warehouse_id: None, quantities: Vec::new() },
            )
            .await
            .unwrap();
        assert_eq!(approved.sourcing_warehouse_id(), Some(w.central.id));

        let manifest = |serials: &[&str]| -> Vec<SkuSerial> {
            serials
                .iter()
                .map(|s| SkuSerial { sku: BATTERY.into(), serial_number: s.to_string() })
                .collect()
        };

        let err = w
            .services
            .transfers
            .dispatch_warehouse_restock_request_with_file(&w.coordinator, id, manifest(&["C-3"]), None)
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "validation_error");
        assert_eq!(quantities(&w.stock(&w.central).await.unwrap()), (3, 0, 3));

        w.services
            .transfers
            .dispatch_warehouse_restock_request_with_file(
                &w.coordinator,
                id,
                manifest(&["C-3", "C-1"]),
                None,
            )
            .await
            .unwrap();
        assert_eq!(w.component_status("C-2").await.0, ComponentStatus::InStock);
        assert_eq!(w.component_status("C-3").await.0, ComponentStatus::InTransit);

        let err = w
            .services
            .transfers
            .receive_stock_transfer_request(
                &w.manager,
                ReceiptRequest {
                    request_id: id,
                    received_serials: Some(vec!["C-1".into(), "C-2".into()]),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "receipt_mismatch");
        assert!(w.stock(&w.sc_warehouse).await.is_none());

        let received = w
            .services
            .transfers
            .receive_stock_transfer_request(
                &w.manager,
                ReceiptRequest {
                    request_id: id,
                    received_serials: Some(vec!["C-1".into(), "C-3".into()]),
                },
            )
            .await
            .unwrap();
        assert_eq!(received.status(), TransferStatus::Received);
        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (2, 0, 2));
        assert_eq!(quantities(&w.stock(&w.central).await.unwrap()), (1, 0, 1));
    }

    #[tokio::test]
    async fn history_reconciles_with_the_bucket() {
        let w = setup().await;
        let stock = w.stock_in(&w.sc_warehouse, &["SN-1", "SN-2", "SN-3", "SN-4"]).await;
        let kept = w
            .services
            .reservations
            .reserve_components(&w.manager, w.reserve(1))
            .await
            .unwrap();
        let cancelled = w
            .services
            .reservations
            .reserve_components(&w.manager, w.reserve(2))
            .await
            .unwrap();
        w.services
            .reservations
            .cancel_reservation(&w.manager, cancelled.id_typed(), None)
            .await
            .unwrap();
        w.services
            .reservations
            .pickup_reserved_components(&w.manager, &[kept.id_typed()], w.technician.user_id)
            .await
            .unwrap();
        w.services
            .reservations
            .install_component(&w.manager, kept.id_typed())
            .await
            .unwrap();

        let page = w
            .services
            .adjustments
            .get_stock_history(&w.manager, stock.id, 1, 100)
            .await
            .unwrap();
        let stock = w.stock(&w.sc_warehouse).await.unwrap();
        assert_eq!(page.total, page.entries.len() as i64);
        assert_eq!(
            page.entries.iter().map(|e| e.delta_in_stock).sum::<i64>(),
            stock.quantity_in_stock()
        );
        assert_eq!(
            page.entries.iter().map(|e| e.delta_reserved).sum::<i64>(),
            stock.quantity_reserved()
        );
        // Newest first.
        assert_eq!(page.entries[0].cause, HistoryCause::ComponentsInstalled);
        assert_eq!(page.entries[0].in_stock_after, stock.quantity_in_stock());

        let second = w
            .services
            .adjustments
            .get_stock_history(&w.manager, stock.id, 2, 2)
            .await
            .unwrap();
        assert_eq!(second.page, 2);
        assert_eq!(second.entries.len(), 2);
        assert_eq!(second.total_pages, (page.total + 1) / 2);
    }

    #[tokio::test]
    async fn history_pages_are_newest_first_and_clamped() {
        let w = setup_with(InventoryConfig {
            max_history_page_size: 4,
            ..InventoryConfig::default()
        })
        .await;
        for n in 1..=7 {
            w.stock_in(&w.sc_warehouse, &[format!("SN-{n}").as_str()]).await;
        }
        let stock = w.stock(&w.sc_warehouse).await.unwrap();
        let history = |page: u32, limit: u32| {
            w.services
                .adjustments
                .get_stock_history(&w.manager, stock.id, page, limit)
        };

        // A limit above the maximum is capped.
        let first = history(1, 50).await.unwrap();
        assert_eq!((first.page, first.limit), (1, 4));
        assert_eq!((first.total, first.total_pages), (7, 2));
        assert_eq!(first.entries.len(), 4);

        let second = history(2, 4).await.unwrap();
        assert_eq!(second.page, 2);
        assert_eq!(second.entries.len(), 3);

        let mut all = first.entries.clone();
        all.extend(second.entries.clone());
        assert_eq!(
            all.iter().map(|e| e.in_stock_after).collect::<Vec<_>>(),
            vec![7, 6, 5, 4, 3, 2, 1]
        );
        assert!(all.windows(2).all(|pair| pair[0].occurred_at >= pair[1].occurred_at));

        // Page 0 is read as the first page.
        let zero = history(0, 4).await.unwrap();
        assert_eq!(zero.page, 1);
        assert_eq!(
            zero.entries.iter().map(|e| e.id).collect::<Vec<_>>(),
            first.entries.iter().map(|e| e.id).collect::<Vec<_>>()
        );

        let tiny = history(1, 0).await.unwrap();
        assert_eq!((tiny.limit, tiny.entries.len(), tiny.total_pages), (1, 1, 7));
        assert_eq!(tiny.entries[0].in_stock_after, 7);

        let past_end = history(3, 4).await.unwrap();
        assert!(past_end.entries.is_empty());
        assert_eq!(past_end.total, 7);
    }

    #[tokio::test]
    async fn low_stock_is_published_after_the_reservation_commits() {
        let w = setup().await;
        w.stock_in(&w.sc_warehouse, &["SN-1", "SN-2", "SN-3"]).await;
        let sub = w.bus.subscribe();

        w.services
            .reservations
            .reserve_components(&w.manager, w.reserve(1))
            .await
            .unwrap();
        let types = event_types(&sub);
        assert!(types.contains(&"inventory.stock.low".to_string()), "{types:?}");
        assert!(types.contains(&"inventory.reservation.status_changed".to_string()));

        // Still low: the cooldown suppresses a second alert.
        w.services
            .reservations
            .reserve_components(&w.manager, w.reserve(1))
            .await
            .unwrap();
        assert!(!event_types(&sub).contains(&"inventory.stock.low".to_string()));

        // A failed reservation publishes nothing.
        let _ = w
            .services
            .reservations
            .reserve_components(&w.manager, w.reserve(5))
            .await
            .unwrap_err();
        assert!(sub.drain().is_empty());
    }

    #[tokio::test]
    async fn actors_are_confined_to_their_warehouses_and_roles() {
        let w = setup().await;
        w.stock_in(&w.sc_warehouse, &["SN-1"]).await;

        let mut foreign = w.reserve(1);
        foreign.warehouse_id = Some(w.sc_warehouse.id);
        let err = w
            .services
            .reservations
            .reserve_components(&w.other_manager, foreign)
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "unauthorized");

        let err = w
            .services
            .reservations
            .reserve_components(&w.technician, w.reserve(1))
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "unauthorized");

        let request = w
            .services
            .transfers
            .create_stock_transfer_request(&w.manager, w.battery_request(1))
            .await
            .unwrap();
        let err = w
            .services
            .transfers
            .approve_stock_transfer_request(
                &w.manager,
                ApprovalRequest {
                    request_id: request.id_typed(),
                    sourcing_warehouse_id: Some(w.other_warehouse.id),
                    quantities: Vec::new(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "unauthorized");

        let outsider = Actor::company(UserId::new(), Role::PartsCoordinatorCompany, CompanyId::new());
        let err = w
            .services
            .transfers
            .get_stock_transfer_request(&outsider, request.id_typed())
            .await
            .unwrap_err();
        assert_eq!(kind(&err), "unauthorized");

        assert_eq!(quantities(&w.stock(&w.sc_warehouse).await.unwrap()), (1, 0, 1));
    }

    #[tokio::test]
    async fn summary_covers_every_visible_warehouse() {
        let w = setup().await;
        w.stock_in(&w.central, &["C-1", "C-2"]).await;
        w.stock_in(&w.sc_warehouse, &["SN-1", "SN-2", "SN-3"]).await;
        w.services
            .reservations
            .reserve_components(&w.manager, w.reserve(1))
            .await
            .unwrap();

        let summary = w.services.reporting.inventory_summary(&w.admin).await.unwrap();
        assert_eq!(summary.len(), 3);
        let row = |id: WarehouseId| summary.iter().find(|s| s.warehouse_id == id).unwrap();
        assert_eq!(row(w.central.id).total_in_stock, 2);
        assert_eq!(
            (row(w.sc_warehouse.id).total_reserved, row(w.sc_warehouse.id).total_available),
            (1, 2)
        );
        assert_eq!(row(w.other_warehouse.id).total_in_stock, 0);

        let own = w.services.reporting.inventory_summary(&w.manager).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].warehouse_id, w.sc_warehouse.id);

        let low = w
            .services
            .reporting
            .stock_lines(&w.manager, None, true)
            .await
            .unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].sku, BATTERY);
        assert!(low[0].is_low);
    }
}
