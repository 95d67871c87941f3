//! Master data repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over geoareas, people, vehicle makes, vehicles, gas brand/grades
//!   and trip categories.
//!
//! # Invariants
//! - `vehicle.driverid` must reference a person flagged as driver.
//! - List results are ordered by `_id ASC` so "lowest id" fallbacks are
//!   deterministic.

use crate::model::geo_area::GeoArea;
use crate::model::person::Person;
use crate::model::trip::TripCategory;
use crate::model::tstop::GasBrandGrade;
use crate::model::vehicle::{Vehicle, VehicleMake};
use crate::model::RecordId;
use crate::repo::{
    bool_to_int, ensure_connection_ready, int_to_bool, require_optional_reference,
    require_reference, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PERSON_SELECT_SQL: &str = "SELECT _id, name, is_driver, is_active, comment FROM person";

const VEHICLE_SELECT_SQL: &str = "SELECT
    _id,
    nickname,
    driverid,
    makeid,
    model,
    year,
    vin,
    plate,
    odo_orig,
    odo_curr,
    last_tripid,
    is_active,
    comment
FROM vehicle";

/// Repository interface for master data records.
pub trait MasterDataRepository {
    fn insert_geo_area(&self, area: &GeoArea) -> RepoResult<RecordId>;
    fn update_geo_area(&self, area: &GeoArea) -> RepoResult<()>;
    fn get_geo_area(&self, id: RecordId) -> RepoResult<Option<GeoArea>>;
    fn list_geo_areas(&self) -> RepoResult<Vec<GeoArea>>;

    fn insert_person(&self, person: &Person) -> RepoResult<RecordId>;
    fn update_person(&self, person: &Person) -> RepoResult<()>;
    fn get_person(&self, id: RecordId) -> RepoResult<Option<Person>>;
    /// Lists people; `drivers_only` keeps rows with `is_driver = 1`.
    fn list_people(&self, drivers_only: bool) -> RepoResult<Vec<Person>>;

    fn insert_vehicle_make(&self, make: &VehicleMake) -> RepoResult<RecordId>;
    fn list_vehicle_makes(&self) -> RepoResult<Vec<VehicleMake>>;

    fn insert_vehicle(&self, vehicle: &Vehicle) -> RepoResult<RecordId>;
    fn update_vehicle(&self, vehicle: &Vehicle) -> RepoResult<()>;
    fn get_vehicle(&self, id: RecordId) -> RepoResult<Option<Vehicle>>;
    /// Lists vehicles; `active_only` keeps rows with `is_active = 1`.
    fn list_vehicles(&self, active_only: bool) -> RepoResult<Vec<Vehicle>>;

    fn insert_gas_brand_grade(&self, grade: &GasBrandGrade) -> RepoResult<RecordId>;
    fn list_gas_brand_grades(&self) -> RepoResult<Vec<GasBrandGrade>>;

    fn insert_trip_category(&self, category: &TripCategory) -> RepoResult<RecordId>;
    fn list_trip_categories(&self) -> RepoResult<Vec<TripCategory>>;
}

/// SQLite-backed master data repository.
pub struct SqliteMasterDataRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMasterDataRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn require_driver(&self, column: &'static str, id: RecordId) -> RepoResult<()> {
        match self.get_person(id)? {
            Some(person) if person.is_driver => Ok(()),
            _ => Err(RepoError::MissingReference {
                table: "person",
                column,
                id,
            }),
        }
    }

    fn list_named(&self, sql: &str) -> RepoResult<Vec<(RecordId, String)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }
}

impl MasterDataRepository for SqliteMasterDataRepository<'_> {
    fn insert_geo_area(&self, area: &GeoArea) -> RepoResult<RecordId> {
        area.validate()?;
        self.conn
            .execute("INSERT INTO geoarea (aname) VALUES (?1);", [&area.name])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_geo_area(&self, area: &GeoArea) -> RepoResult<()> {
        area.validate()?;
        let changed = self.conn.execute(
            "UPDATE geoarea SET aname = ?1 WHERE _id = ?2;",
            params![area.name, area.id],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: "geoarea",
                id: area.id,
            });
        }
        Ok(())
    }

    fn get_geo_area(&self, id: RecordId) -> RepoResult<Option<GeoArea>> {
        let area = self
            .conn
            .query_row(
                "SELECT _id, aname FROM geoarea WHERE _id = ?1;",
                [id],
                |row| {
                    Ok(GeoArea {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(area)
    }

    fn list_geo_areas(&self) -> RepoResult<Vec<GeoArea>> {
        Ok(self
            .list_named("SELECT _id, aname FROM geoarea ORDER BY _id ASC;")?
            .into_iter()
            .map(|(id, name)| GeoArea { id, name })
            .collect())
    }

    fn insert_person(&self, person: &Person) -> RepoResult<RecordId> {
        person.validate()?;
        self.conn.execute(
            "INSERT INTO person (name, is_driver, is_active, comment) VALUES (?1, ?2, ?3, ?4);",
            params![
                person.name,
                bool_to_int(person.is_driver),
                bool_to_int(person.is_active),
                person.comment.as_deref(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_person(&self, person: &Person) -> RepoResult<()> {
        person.validate()?;
        let changed = self.conn.execute(
            "UPDATE person
             SET name = ?1, is_driver = ?2, is_active = ?3, comment = ?4
             WHERE _id = ?5;",
            params![
                person.name,
                bool_to_int(person.is_driver),
                bool_to_int(person.is_active),
                person.comment.as_deref(),
                person.id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: "person",
                id: person.id,
            });
        }
        Ok(())
    }

    fn get_person(&self, id: RecordId) -> RepoResult<Option<Person>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PERSON_SELECT_SQL} WHERE _id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_person_row(row)?));
        }
        Ok(None)
    }

    fn list_people(&self, drivers_only: bool) -> RepoResult<Vec<Person>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PERSON_SELECT_SQL} WHERE (?1 = 0 OR is_driver = 1) ORDER BY _id ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(drivers_only)])?;
        let mut people = Vec::new();
        while let Some(row) = rows.next()? {
            people.push(parse_person_row(row)?);
        }
        Ok(people)
    }

    fn insert_vehicle_make(&self, make: &VehicleMake) -> RepoResult<RecordId> {
        make.validate()?;
        self.conn
            .execute("INSERT INTO vehiclemake (mname) VALUES (?1);", [&make.name])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_vehicle_makes(&self) -> RepoResult<Vec<VehicleMake>> {
        Ok(self
            .list_named("SELECT _id, mname FROM vehiclemake ORDER BY _id ASC;")?
            .into_iter()
            .map(|(id, name)| VehicleMake { id, name })
            .collect())
    }

    fn insert_vehicle(&self, vehicle: &Vehicle) -> RepoResult<RecordId> {
        vehicle.validate()?;
        self.require_driver("vehicle.driverid", vehicle.driver_id)?;
        require_reference(self.conn, "vehiclemake", "vehicle.makeid", vehicle.make_id)?;
        require_optional_reference(self.conn, "trip", "vehicle.last_tripid", vehicle.last_trip_id)?;

        self.conn.execute(
            "INSERT INTO vehicle (
                nickname,
                driverid,
                makeid,
                model,
                year,
                vin,
                plate,
                odo_orig,
                odo_curr,
                last_tripid,
                is_active,
                comment
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
            params![
                vehicle.nickname,
                vehicle.driver_id,
                vehicle.make_id,
                vehicle.model.as_deref(),
                vehicle.year,
                vehicle.vin.as_deref(),
                vehicle.plate.as_deref(),
                vehicle.odo_orig,
                vehicle.odo_curr,
                vehicle.last_trip_id,
                bool_to_int(vehicle.is_active),
                vehicle.comment.as_deref(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_vehicle(&self, vehicle: &Vehicle) -> RepoResult<()> {
        vehicle.validate()?;
        self.require_driver("vehicle.driverid", vehicle.driver_id)?;
        require_reference(self.conn, "vehiclemake", "vehicle.makeid", vehicle.make_id)?;
        require_optional_reference(self.conn, "trip", "vehicle.last_tripid", vehicle.last_trip_id)?;

        let changed = self.conn.execute(
            "UPDATE vehicle
             SET
                nickname = ?1,
                driverid = ?2,
                makeid = ?3,
                model = ?4,
                year = ?5,
                vin = ?6,
                plate = ?7,
                odo_orig = ?8,
                odo_curr = ?9,
                last_tripid = ?10,
                is_active = ?11,
                comment = ?12
             WHERE _id = ?13;",
            params![
                vehicle.nickname,
                vehicle.driver_id,
                vehicle.make_id,
                vehicle.model.as_deref(),
                vehicle.year,
                vehicle.vin.as_deref(),
                vehicle.plate.as_deref(),
                vehicle.odo_orig,
                vehicle.odo_curr,
                vehicle.last_trip_id,
                bool_to_int(vehicle.is_active),
                vehicle.comment.as_deref(),
                vehicle.id,
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                table: "vehicle",
                id: vehicle.id,
            });
        }
        Ok(())
    }

    fn get_vehicle(&self, id: RecordId) -> RepoResult<Option<Vehicle>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{VEHICLE_SELECT_SQL} WHERE _id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_vehicle_row(row)?));
        }
        Ok(None)
    }

    fn list_vehicles(&self, active_only: bool) -> RepoResult<Vec<Vehicle>> {
        let mut stmt = self.conn.prepare(&format!(
            "{VEHICLE_SELECT_SQL} WHERE (?1 = 0 OR is_active = 1) ORDER BY _id ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(active_only)])?;
        let mut vehicles = Vec::new();
        while let Some(row) = rows.next()? {
            vehicles.push(parse_vehicle_row(row)?);
        }
        Ok(vehicles)
    }

    fn insert_gas_brand_grade(&self, grade: &GasBrandGrade) -> RepoResult<RecordId> {
        grade.validate()?;
        self.conn
            .execute("INSERT INTO gas_brandgrade (name) VALUES (?1);", [&grade.name])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_gas_brand_grades(&self) -> RepoResult<Vec<GasBrandGrade>> {
        Ok(self
            .list_named("SELECT _id, name FROM gas_brandgrade ORDER BY _id ASC;")?
            .into_iter()
            .map(|(id, name)| GasBrandGrade { id, name })
            .collect())
    }

    fn insert_trip_category(&self, category: &TripCategory) -> RepoResult<RecordId> {
        category.validate()?;
        self.conn
            .execute("INSERT INTO tripcategory (cname) VALUES (?1);", [&category.name])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_trip_categories(&self) -> RepoResult<Vec<TripCategory>> {
        Ok(self
            .list_named("SELECT _id, cname FROM tripcategory ORDER BY _id ASC;")?
            .into_iter()
            .map(|(id, name)| TripCategory { id, name })
            .collect())
    }
}

fn parse_person_row(row: &Row<'_>) -> RepoResult<Person> {
    Ok(Person {
        id: row.get("_id")?,
        name: row.get("name")?,
        is_driver: int_to_bool(row.get("is_driver")?, "person.is_driver")?,
        is_active: int_to_bool(row.get("is_active")?, "person.is_active")?,
        comment: row.get("comment")?,
    })
}

fn parse_vehicle_row(row: &Row<'_>) -> RepoResult<Vehicle> {
    let vehicle = Vehicle {
        id: row.get("_id")?,
        nickname: row.get("nickname")?,
        driver_id: row.get("driverid")?,
        make_id: row.get("makeid")?,
        model: row.get("model")?,
        year: row.get("year")?,
        vin: row.get("vin")?,
        plate: row.get("plate")?,
        odo_orig: row.get("odo_orig")?,
        odo_curr: row.get("odo_curr")?,
        last_trip_id: row.get("last_tripid")?,
        is_active: int_to_bool(row.get("is_active")?, "vehicle.is_active")?,
        comment: row.get("comment")?,
    };
    vehicle
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("vehicle {}: {err}", vehicle.id)))?;
    Ok(vehicle)
}
