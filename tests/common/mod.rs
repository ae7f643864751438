use flightdeck::{AppConfig, Catalog, Dashboard};
use std::fs;
use tempfile::TempDir;

pub const CUSTOMERS_CSV: &str = "\
Loyalty#,Customer Name,Country,Province or State,City,Latitude,Longitude,Gender,Education,Income,Marital Status,LoyaltyStatus,EnrollmentDateOpening,CancelledDate,Customer Lifetime Value,EnrollmentType
480934,Cecilia Lin,Canada,Ontario,Toronto,43.65,-79.38,female,Bachelor,70146,Married,Star,2019-02-15,,3839.14,Standard
549612,Dayle Chan,Canada,Alberta,Edmonton,53.54,-113.49,male,College,0,Divorced,Star,2019-03-01,,3839.61,Standard
429460,Necole Hux,Canada,British Columbia,Vancouver,49.28,-123.12,male,College,0,Single,Star,2019-07-10,2020-01-01,3839.75,Standard
608370,Hugo Biel,Canada,Ontario,Toronto,43.65,-79.38,male,College,0,Single,Nova,2020-02-20,,3839.75,Standard
530508,Leah Crow,Canada,Quebec,Montreal,45.50,-73.57,female,Bachelor,97832,Married,Aurora,2020-08-31,,3842.79,2018 Promotion
193662,Ana Zaki,Canada,Yukon,Whitehorse,60.72,-135.05,female,Master,51573,Married,Nova,2021-11-01,,3844.57,Standard
";

pub const METADATA_CSV: &str = "\
Loyalty#;Unique customer identifier
Income;Yearly income in CAD
Customer Lifetime Value;Total invoiced value of the customer
";

const IDS: [i64; 6] = [480934, 549612, 429460, 608370, 530508, 193662];

/// Two months of activity per customer.
pub fn flights_csv() -> String {
    let mut out = String::from(
        "Loyalty#,Year,Month,YearMonthDate,NumFlights,NumFlightsWithCompanions,DistanceKM,PointsAccumulated,PointsRedeemed,DollarCostPointsRedeemed\n",
    );
    for (i, id) in IDS.iter().enumerate() {
        for month in 1..=2 {
            let flights = (i + month) % 4;
            out.push_str(&format!(
                "{id},2021,{month},2021-0{month}-01,{flights},0,{},{},0,0\n",
                flights * 800,
                flights * 80
            ));
        }
    }
    out
}

/// Sample data files in a temporary directory and a config pointing at them.
pub struct SampleData {
    pub dir: TempDir,
    pub config: AppConfig,
}

impl SampleData {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = AppConfig::default();
        let data_dir = dir.path().join("data");
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(data_dir.join(&config.data.customers_file), CUSTOMERS_CSV).unwrap();
        fs::write(data_dir.join(&config.data.flights_file), flights_csv()).unwrap();
        fs::write(data_dir.join(&config.data.metadata_file), METADATA_CSV).unwrap();
        config.data.directory = Some(data_dir);
        config.export.directory = Some(dir.path().join("exports"));
        Self { dir, config }
    }

    pub fn dashboard(&self) -> Dashboard {
        let catalog = Catalog::load(&self.config.data).expect("sample data loads");
        Dashboard::new(catalog, &self.config.data, self.config.charts.clone())
    }
}
